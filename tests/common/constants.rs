#![allow(dead_code)]

pub const ITEM_1_ID: &str = "item-dune";
pub const ITEM_2_ID: &str = "item-dune-2";
pub const MISSING_ITEM_ID: &str = "item-missing";

pub const PROVIDER_NAME: &str = "audible";
pub const DUNE_EXTERNAL_ID: &str = "B002V1OF70";
pub const DUNE_TITLE: &str = "Dune";
pub const DUNE_AUTHOR: &str = "Frank Herbert";
pub const DUNE_NARRATOR: &str = "Scott Brick";

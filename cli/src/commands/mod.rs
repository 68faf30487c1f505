mod backup;
mod gallery;
mod helpers;
mod progress;
mod recipe;
mod roadbook;
mod unlock;
mod weight;

pub(crate) use backup::{cmd_export, cmd_export_image, cmd_import};
pub(crate) use gallery::{cmd_gallery_add, cmd_gallery_list};
pub(crate) use progress::cmd_progress;
pub(crate) use recipe::{cmd_recipe_add, cmd_recipe_list, cmd_recipe_show};
pub(crate) use roadbook::{cmd_roadbook_add, cmd_roadbook_list, cmd_roadbook_show};
pub(crate) use unlock::cmd_unlock;
pub(crate) use weight::{cmd_weight_add, cmd_weight_delete, cmd_weight_list};

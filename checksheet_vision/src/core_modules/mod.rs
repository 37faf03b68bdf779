// Leaf algorithms of the engine, ordered from pixels up to page assembly.
pub mod binarizer;
pub mod box_merge;
pub mod checkbox;
pub mod composite;
pub mod divider;
pub mod exclusion;
pub mod image_helper;
pub mod projection;
pub mod site_policy;

mod armory;

pub use armory::{parse_armory, Armory, ContentError, DEFAULT_ARMORY_XML};

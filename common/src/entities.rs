pub mod capsule;
pub mod letter;

mod generation;

pub use generation::{generate_material, persist_generation, FanoutReport};

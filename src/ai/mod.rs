mod generator;
mod response;
#[cfg(test)]
pub mod testing;

pub use generator::{ContentGenerator, GenerationClient, GenerationInput};
pub use response::GeneratedContent;

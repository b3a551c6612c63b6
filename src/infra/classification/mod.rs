pub mod zero_shot_client;

pub use zero_shot_client::HuggingFaceZeroShotClient;

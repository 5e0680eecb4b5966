//! HTTP API handlers for humor-api

pub mod captions;
pub mod health;
pub mod images;
pub mod presign;
pub mod scoreboard;
pub mod votes;

pub use captions::{extract_caption_texts, post_captions, save_caption_batch};
pub use health::health_routes;
pub use images::list_images;
pub use presign::proxy_presign;
pub use scoreboard::{get_image_scoreboard, get_scoreboard};
pub use votes::submit_vote;

mod dry_trackpad_listener;
mod mt_decoder;
mod trackpad_listener;
mod r#trait;

#[cfg(test)]
pub use self::dry_trackpad_listener::synthetic_swipe;
pub use self::r#trait::create_trackpad_listener;

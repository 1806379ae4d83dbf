pub mod emotes;
pub mod time;

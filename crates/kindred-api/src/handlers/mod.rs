pub mod health;
pub mod photo_delete;
pub mod photo_upload;

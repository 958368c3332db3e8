pub mod broadcast;
pub mod lifecycle;
pub mod locator;
pub mod route;
pub mod tracker;

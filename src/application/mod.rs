pub mod announcer;
pub mod arrows;
pub mod dto;
pub mod mapper;
pub mod navigation;
pub mod overlay;
pub mod ports;
pub mod services;
pub mod session;
pub mod store;

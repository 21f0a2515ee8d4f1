pub mod proc_loader;
pub mod proc_validator;
pub mod services;
pub mod settings;

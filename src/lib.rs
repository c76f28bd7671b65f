pub mod configure;
pub mod logger;
pub mod report;
pub mod transfer;

pub mod controller;
pub mod federated;
pub mod model;
pub mod router;
pub mod service;

pub mod mock_serving_client;
pub mod mock_serving_server;

pub use mock_serving_client::MockServingClient;

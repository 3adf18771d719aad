pub mod schema;

pub use schema::{
    default_config_path, Config, GatewayConfig, ResponsePolicy, WeatherConfig, API_KEY_ENV,
    BASE_URL_ENV,
};

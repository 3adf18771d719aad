//! cityweather: current temperatures for many cities in one request.
//!
//! `GET /weather?cities=London,Tokyo` fans out one weatherapi.com lookup per
//! city, joins on all of them, and answers with JSON shaped by the configured
//! [`config::ResponsePolicy`].

pub mod config;
pub mod gateway;
pub mod policy;
pub mod resolver;
pub mod weather;

pub use config::{Config, ResponsePolicy};
pub use resolver::{CityQuery, FanOutResolver, Resolution};
pub use weather::{LookupError, WeatherError, WeatherProvider, WeatherReport};

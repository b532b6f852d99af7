pub mod exchange_rates;
pub mod stripe;

pub use exchange_rates::ExchangeRateClient;
pub use stripe::StripeCustomerClient;

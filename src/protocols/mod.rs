pub mod account;
pub mod oneinch;

pub use account::{AccountGateway, EthersGateway};
pub use oneinch::{OneInchClient, SwapQuoter};

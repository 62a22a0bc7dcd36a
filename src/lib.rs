pub mod abi;
pub mod config;
pub mod contract;
pub mod decode;
pub mod error;
pub mod events;
pub mod explorer;
pub mod feed;
pub mod game;
pub mod schedule;
pub mod view;
pub mod wallets;

pub mod test_helpers;

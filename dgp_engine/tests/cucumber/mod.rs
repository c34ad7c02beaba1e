mod setups;
pub mod shop_world;
mod steps;

pub use shop_world::ShopWorld;

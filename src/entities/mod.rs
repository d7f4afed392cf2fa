pub mod agent;
pub mod order;
pub mod order_item;
pub mod product;

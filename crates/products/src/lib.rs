//! Product catalog domain: the `Product` aggregate.

pub mod product;

pub use product::{
    ArchiveProduct, CreateProduct, PRODUCT_AGGREGATE_TYPE, Pricing, Product, ProductArchived,
    ProductCommand, ProductCreated, ProductEvent, ProductId, ProductStatus, ReorderLevelSet,
    SetReorderLevel,
};

//! SeaORM entity models

mod research_metadata;

pub use research_metadata::{
    Entity as PaperEntity,
    Model as Paper,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
};

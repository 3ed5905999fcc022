//! Arrow schema of the item table.
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub fn build_items_schema(dim: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("domain", DataType::Utf8, true),
		Field::new("meta_json", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32), true),
	]))
}

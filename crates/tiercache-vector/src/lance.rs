use std::sync::Arc;

use anyhow::{anyhow, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use tiercache_core::traits::VectorStore;
use tiercache_core::types::{DomainFilter, Meta, Neighbor, StoredItem};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::schema::build_items_schema;
use crate::table::{ensure_table, open_db};

/// `VectorStore` over a LanceDB table with columns
/// `id, text, domain, meta_json, vector`.
///
/// The trait is synchronous, so the store owns a tokio runtime and blocks on
/// it. Do not call it from inside another tokio runtime.
pub struct LanceVectorStore {
	rt: Runtime,
	table: Table,
	dim: usize,
}

impl LanceVectorStore {
	pub fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
		let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
		let table = rt.block_on(async {
			let conn = open_db(uri).await?;
			ensure_table(&conn, table_name, build_items_schema(dim)).await?;
			Ok::<_, anyhow::Error>(conn.open_table(table_name).execute().await?)
		})?;
		info!(uri, table = table_name, dim, "lance vector store opened");
		Ok(Self { rt, table, dim })
	}

	fn to_record_batch(&self, items: &[(StoredItem, Vec<f32>)]) -> Result<RecordBatch> {
		let mut ids = Vec::with_capacity(items.len()); let mut texts = Vec::with_capacity(items.len());
		let mut domains = Vec::with_capacity(items.len()); let mut metas = Vec::with_capacity(items.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(items.len());
		for (item, vector) in items {
			if vector.len() != self.dim { return Err(anyhow!("vector for '{}' has dim {}, table expects {}", item.id, vector.len(), self.dim)); }
			ids.push(item.id.clone()); texts.push(item.text.clone());
			domains.push(item.domain().map(str::to_string)); metas.push(serde_json::to_string(&item.meta)?);
			vectors.push(Some(vector.iter().map(|&x| Some(x)).collect()));
		}
		Ok(RecordBatch::try_new(build_items_schema(self.dim), vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(texts)),
			Arc::new(StringArray::from(domains)),
			Arc::new(StringArray::from(metas)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), self.dim as i32)),
		])?)
	}
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("column '{}' missing", name))
}

fn id_predicate(id: &str) -> String { format!("id = '{}'", id.replace('\'', "''")) }

impl VectorStore for LanceVectorStore {
	fn upsert_batch(&self, items: Vec<(StoredItem, Vec<f32>)>) -> Result<()> {
		if items.is_empty() { return Ok(()); }
		let rb = self.to_record_batch(&items)?;
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_items_schema(self.dim)));
		self.rt.block_on(async {
			// Upsert behavior via merge_insert: id is unique
			let mut mi = self.table.merge_insert(&["id"]);
			mi.when_matched_update_all(None).when_not_matched_insert_all();
			mi.execute(reader).await?;
			Ok::<_, anyhow::Error>(())
		})?;
		debug!(rows = items.len(), "lance upsert");
		Ok(())
	}

	fn nearest(&self, vector: &[f32], filter: &DomainFilter, k: usize) -> Result<Vec<Neighbor>> {
		if k == 0 { return Ok(Vec::new()); }
		self.rt.block_on(async {
			let mut query = self.table.vector_search(vector.to_vec())?.distance_type(DistanceType::Cosine).limit(k);
			if let Some(sql) = filter.to_sql() { query = query.only_if(sql); }
			let mut stream = query.execute().await?;
			let mut out = Vec::new();
			while let Some(batch) = stream.try_next().await? {
				let ids = string_col(&batch, "id")?; let texts = string_col(&batch, "text")?; let metas = string_col(&batch, "meta_json")?;
				let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>()).ok_or_else(|| anyhow!("column '_distance' missing"))?;
				for i in 0..batch.num_rows() {
					let meta: Meta = serde_json::from_str(metas.value(i))?;
					let item = StoredItem { id: ids.value(i).to_string(), text: texts.value(i).to_string(), meta };
					out.push(Neighbor { item, distance: if distances.is_null(i) { 1.0 } else { distances.value(i) } });
				}
			}
			out.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
			Ok::<_, anyhow::Error>(out)
		})
	}

	fn delete(&self, id: &str) -> Result<bool> {
		self.rt.block_on(async {
			let predicate = id_predicate(id);
			if self.table.count_rows(Some(predicate.clone())).await? == 0 { return Ok::<_, anyhow::Error>(false); }
			self.table.delete(&predicate).await?;
			Ok::<_, anyhow::Error>(true)
		})
	}

	fn len(&self) -> Result<usize> {
		Ok(self.rt.block_on(self.table.count_rows(None))?)
	}

	fn clear(&self) -> Result<()> {
		self.rt.block_on(self.table.delete("id IS NOT NULL"))?;
		Ok(())
	}
}

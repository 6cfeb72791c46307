//! Vector store adapter over LanceDB — an external collaborator per §1/§6.
//! The core never reaches for HNSW internals directly; it only ever calls
//! `upsert` and `ann_search` through this narrow surface. Schema mirrors
//! §6's persisted-state layout: `id`, `content`, `metadata` (JSON),
//! `embedding` (fixed-size vector of the configured dimension).

use anyhow::{Context, Result};
use arrow_array::{Array, Float32Array, RecordBatch, RecordBatchIterator, StringArray, FixedSizeListArray};
use arrow_schema::{DataType, Field, Schema};
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

use crate::types::Fragment;

/// One row as persisted in the vector store: a stable id plus the Fragment
/// it was derived from.
#[derive(Debug, Clone)]
pub struct StoredFragment {
    pub id: String,
    pub fragment: Fragment,
}

pub struct LanceStore {
    db: lancedb::Connection,
    dimension: usize,
    table_name: String,
}

impl LanceStore {
    pub async fn new(path: &str, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(path).ok();
        let db = lancedb::connect(path)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let store = Self {
            db,
            dimension,
            table_name: "fragments".to_string(),
        };

        store.ensure_table().await?;
        Ok(store)
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("metadata_json", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                true,
            ),
        ]))
    }

    async fn ensure_table(&self) -> Result<()> {
        let names = self.db.table_names().execute().await?;
        if !names.contains(&self.table_name) {
            let schema = self.schema();
            let seed_vec = vec![0.0f32; self.dimension];
            let vector_field = Field::new("item", DataType::Float32, true);
            let vector_array = FixedSizeListArray::new(
                Arc::new(vector_field),
                self.dimension as i32,
                Arc::new(Float32Array::from(seed_vec)) as Arc<dyn Array>,
                None,
            );

            let batch = RecordBatch::try_new(
                schema.clone(),
                vec![
                    Arc::new(StringArray::from(vec!["__seed__"])) as Arc<dyn Array>,
                    Arc::new(StringArray::from(vec![""])),
                    Arc::new(StringArray::from(vec![""])),
                    Arc::new(StringArray::from(vec!["{}"])),
                    Arc::new(vector_array) as Arc<dyn Array>,
                ],
            )
            .context("Failed to build seed RecordBatch")?;

            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            self.db
                .create_table(&self.table_name, Box::new(batches))
                .execute()
                .await
                .context("Failed to create fragments table")?;

            let table = self.db.open_table(&self.table_name).execute().await?;
            table.delete("id = '__seed__'").await.ok();
        }
        Ok(())
    }

    /// Persist a batch of fragments, each keyed by a caller-supplied stable
    /// id (the Ingestor uses `source || "#" || chunk_index`). The vector
    /// store transparently owns embedding persistence; the embedding itself
    /// must already be populated on each `Fragment` by the caller (the
    /// Ingestor invokes the embedding model before calling this).
    pub async fn upsert(&self, rows: &[StoredFragment]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("Failed to open fragments table")?;

        let schema = self.schema();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let sources: Vec<&str> = rows.iter().map(|r| r.fragment.source()).collect();
        let contents: Vec<&str> = rows.iter().map(|r| r.fragment.content.as_str()).collect();
        let metadata_jsons: Vec<String> = rows
            .iter()
            .map(|r| serde_json::to_string(&r.fragment.metadata).unwrap_or_else(|_| "{}".to_string()))
            .collect();
        let metadata_refs: Vec<&str> = metadata_jsons.iter().map(String::as_str).collect();

        let flat: Vec<f32> = rows
            .iter()
            .flat_map(|r| {
                let mut v = r.fragment.embedding.clone();
                v.resize(self.dimension, 0.0);
                v
            })
            .collect();
        let vector_field = Field::new("item", DataType::Float32, true);
        let vector_array = FixedSizeListArray::new(
            Arc::new(vector_field),
            self.dimension as i32,
            Arc::new(Float32Array::from(flat)) as Arc<dyn Array>,
            None,
        );

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(ids)) as Arc<dyn Array>,
                Arc::new(StringArray::from(sources)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(metadata_refs)),
                Arc::new(vector_array) as Arc<dyn Array>,
            ],
        )
        .context("Failed to build fragments RecordBatch")?;

        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        table
            .add(Box::new(reader))
            .execute()
            .await
            .context("Failed to insert fragments")?;

        Ok(())
    }

    /// C4's backing ANN query. HNSW parameters (`m=16`, `ef_construction=200`
    /// per §6) are the vector engine's own tunables, configured at index
    /// creation time in `create_index_if_needed`, not surfaced here.
    pub async fn ann_search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<(StoredFragment, f32)>> {
        let table = self.db.open_table(&self.table_name).execute().await?;
        let query = table
            .query()
            .nearest_to(embedding)?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(top_k);

        let results = query.execute().await.context("LanceDB vector search failed")?;
        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        Ok(extract_rows(&batches))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<StoredFragment>> {
        let table = self.db.open_table(&self.table_name).execute().await?;
        let predicate = format!("id = '{}'", id.replace('\'', "''"));
        let results = table.query().only_if(predicate).limit(1).execute().await?;
        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        Ok(extract_rows(&batches).into_iter().next().map(|(row, _)| row))
    }

    pub async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoredFragment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut out = Vec::new();
        for chunk in ids.chunks(50) {
            let list: Vec<String> = chunk.iter().map(|id| format!("'{}'", id.replace('\'', "''"))).collect();
            let predicate = format!("id IN ({})", list.join(", "));
            let results = table.query().only_if(predicate).execute().await?;
            let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
            out.extend(extract_rows(&batches).into_iter().map(|(row, _)| row));
        }
        Ok(out)
    }

    pub async fn create_index_if_needed(&self) -> Result<()> {
        let table = self.db.open_table(&self.table_name).execute().await?;
        let count = table.count_rows(None).await?;
        if count >= 1_000 {
            table
                .create_index(&["embedding"], lancedb::index::Index::Auto)
                .execute()
                .await
                .context("Failed to create ANN index")?;
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<usize> {
        let table = self.db.open_table(&self.table_name).execute().await?;
        Ok(table.count_rows(None).await?)
    }
}

fn extract_rows(batches: &[RecordBatch]) -> Vec<(StoredFragment, f32)> {
    let mut out = Vec::new();
    for batch in batches {
        let ids = batch.column_by_name("id").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let contents = batch.column_by_name("content").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let metadata_jsons = batch.column_by_name("metadata_json").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        let (Some(ids), Some(contents), Some(metadata_jsons)) = (ids, contents, metadata_jsons) else {
            continue;
        };

        for i in 0..batch.num_rows() {
            let id = ids.value(i).to_string();
            if id == "__seed__" {
                continue;
            }
            let metadata = serde_json::from_str(metadata_jsons.value(i)).unwrap_or_default();
            let mut fragment = Fragment::new(contents.value(i).to_string());
            fragment.metadata = metadata;
            // cosine distance -> similarity (§4.4 "decreasing cosine similarity")
            let similarity = distances.map(|d| 1.0 - d.value(i)).unwrap_or(0.0);
            out.push((StoredFragment { id, fragment }, similarity));
        }
    }
    out
}

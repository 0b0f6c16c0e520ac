//! Vector storage using LanceDB for semantic search

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lance_arrow::FixedSizeListArrayExt;
use lancedb::connect;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::memory::MemoryItem;

const TABLE_NAME: &str = "memories";

/// Vector storage backend using LanceDB
pub struct VectorStorage {
    db: lancedb::Connection,
    dimensions: usize,
}

impl VectorStorage {
    /// Create a new vector storage
    pub async fn new(config: &Config) -> Result<Self> {
        let db = connect(config.vector_db_path().to_str().unwrap())
            .execute()
            .await
            .map_err(|e| Error::vector_db(e.to_string()))?;

        let storage = Self {
            db,
            dimensions: config.embedding_dimensions,
        };

        storage.ensure_table().await?;

        Ok(storage)
    }

    /// Get the schema for the memories table
    fn schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("owner_id", DataType::Utf8, false),
            Field::new("memory_type", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimensions as i32,
                ),
                false,
            ),
        ])
    }

    /// Ensure the memories table exists
    async fn ensure_table(&self) -> Result<()> {
        let tables = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::vector_db(e.to_string()))?;

        if !tables.contains(&TABLE_NAME.to_string()) {
            let schema = Arc::new(self.schema());

            let empty_batch = RecordBatch::new_empty(schema.clone());
            let batches = vec![empty_batch];
            let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), schema);

            self.db
                .create_table(TABLE_NAME, Box::new(reader))
                .execute()
                .await
                .map_err(|e| Error::vector_db(e.to_string()))?;
        }

        Ok(())
    }

    /// Insert or update a memory in the vector store
    pub async fn upsert_memory(&self, item: &MemoryItem) -> Result<()> {
        let embedding = item
            .embedding
            .as_ref()
            .ok_or_else(|| Error::vector_db("Memory has no embedding"))?;

        if embedding.len() != self.dimensions {
            return Err(Error::vector_db(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimensions,
                embedding.len()
            )));
        }

        // Remove any existing record first
        let _ = self.delete_memory(item.id).await;

        let id_array = StringArray::from(vec![item.id.to_string()]);
        let owner_array = StringArray::from(vec![item.owner_id.clone()]);
        let type_array = StringArray::from(vec![item.memory_type.to_string()]);
        let content_array = StringArray::from(vec![item.content.clone()]);

        let values = Float32Array::from(embedding.clone());
        let vector_array = FixedSizeListArray::try_new_from_values(values, self.dimensions as i32)
            .map_err(|e: arrow_schema::ArrowError| Error::vector_db(e.to_string()))?;

        let schema = Arc::new(self.schema());
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(id_array) as Arc<dyn Array>,
                Arc::new(owner_array),
                Arc::new(type_array),
                Arc::new(content_array),
                Arc::new(vector_array),
            ],
        )
        .map_err(|e| Error::vector_db(e.to_string()))?;

        let batches = vec![batch];
        let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), schema);

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| Error::vector_db(e.to_string()))?;

        table
            .add(Box::new(reader))
            .execute()
            .await
            .map_err(|e| Error::vector_db(e.to_string()))?;

        Ok(())
    }

    /// Delete a memory from the vector store
    pub async fn delete_memory(&self, id: Uuid) -> Result<()> {
        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| Error::vector_db(e.to_string()))?;

        table
            .delete(&format!("id = '{}'", id))
            .await
            .map_err(|e| Error::vector_db(e.to_string()))?;

        Ok(())
    }

    /// Search for the nearest memories belonging to one owner.
    ///
    /// Returns (id, similarity) pairs, similarity in (0, 1].
    pub async fn search(
        &self,
        query_embedding: &[f32],
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<(Uuid, f64)>> {
        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e: lancedb::Error| Error::vector_db(e.to_string()))?;

        let query = table
            .vector_search(query_embedding.to_vec())
            .map_err(|e: lancedb::Error| Error::vector_db(e.to_string()))?
            .limit(limit)
            .only_if(format!("owner_id = '{}'", owner_id.replace('\'', "''")));

        let stream = query
            .execute()
            .await
            .map_err(|e: lancedb::Error| Error::vector_db(e.to_string()))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect::<Vec<RecordBatch>>()
            .await
            .map_err(|e: lancedb::Error| Error::vector_db(e.to_string()))?;

        let mut results = Vec::new();

        for batch in batches {
            let id_col: &Arc<dyn Array> = batch
                .column_by_name("id")
                .ok_or_else(|| Error::vector_db("Missing id column"))?;
            let distance_col: &Arc<dyn Array> = batch
                .column_by_name("_distance")
                .ok_or_else(|| Error::vector_db("Missing _distance column"))?;

            let ids = id_col
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| Error::vector_db("id column is not StringArray"))?;
            let distances = distance_col
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| Error::vector_db("_distance column is not Float32Array"))?;

            for i in 0..batch.num_rows() {
                // LanceDB returns L2 distance, convert to similarity score
                let distance = distances.value(i) as f64;
                let score = 1.0 / (1.0 + distance);

                let id = Uuid::parse_str(ids.value(i))
                    .map_err(|e| Error::vector_db(e.to_string()))?;
                results.push((id, score));
            }
        }

        Ok(results)
    }
}

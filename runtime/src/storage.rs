// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

//! SQLite catalog store.
//!
//! Four tables, each behind an optional name prefix so several shops can
//! share one database:
//!
//! - `target_product`: the monitored catalog, grouped by `id_target`
//! - `competitor_target`: which competitors are watched for which target
//! - `price_history`: append-only scraped observations
//! - `product_history_relation`: matching results, keyed by the pair

use crate::config::validate_prefix;
use pricelens::{
    Assignment, CatalogProduct, CatalogStore, MatchPlan, PriceObservation, StoreError,
};
use rusqlite::{params, Connection};
use std::path::Path;

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// A new row for `price_history`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub competitor_id: i64,
    pub title: String,
    pub description: String,
    pub price_raw: String,
    pub url: String,
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

/// Catalog store backed by one SQLite connection.
pub struct SqliteStore {
    db: Connection,
    prefix: String,
}

impl SqliteStore {
    /// Open or create a store and make sure the schema exists.
    pub fn open(path: &Path, prefix: &str) -> Result<Self, StoreError> {
        validate_prefix(prefix).map_err(|e| StoreError::Backend(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }
        let db = Connection::open(path).map_err(backend)?;
        let store = Self {
            db,
            prefix: prefix.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn table(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let p = &self.prefix;
        self.db
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {p}target_product (
                    id_product INTEGER PRIMARY KEY,
                    id_target INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    price TEXT NOT NULL DEFAULT '',
                    url TEXT NOT NULL DEFAULT ''
                );
                CREATE TABLE IF NOT EXISTS {p}competitor_target (
                    id_competitor INTEGER NOT NULL,
                    id_target INTEGER NOT NULL,
                    PRIMARY KEY (id_competitor, id_target)
                );
                CREATE TABLE IF NOT EXISTS {p}price_history (
                    id_history INTEGER PRIMARY KEY AUTOINCREMENT,
                    id_competitor INTEGER NOT NULL,
                    product_title TEXT NOT NULL DEFAULT '',
                    product_description TEXT NOT NULL DEFAULT '',
                    price_raw TEXT NOT NULL,
                    product_url TEXT NOT NULL,
                    price_amount REAL,
                    price_currency TEXT,
                    scraped_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS {p}product_history_relation (
                    id_product INTEGER NOT NULL,
                    id_history INTEGER NOT NULL,
                    similarity REAL NOT NULL,
                    matched_at TEXT NOT NULL,
                    PRIMARY KEY (id_product, id_history)
                );"
            ))
            .map_err(backend)
    }

    /// Insert or replace a catalog product.
    pub fn upsert_product(&self, product: &CatalogProduct) -> Result<(), StoreError> {
        self.db
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (id_product, id_target, name, description, price, url)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    self.table("target_product")
                ),
                params![
                    product.id,
                    product.target_id,
                    product.name,
                    product.description,
                    product.price,
                    product.url
                ],
            )
            .map_err(backend)?;
        Ok(())
    }

    /// Watch a competitor for a target group.
    pub fn link_competitor(&self, competitor_id: i64, target_id: i64) -> Result<(), StoreError> {
        self.db
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO {} (id_competitor, id_target) VALUES (?1, ?2)",
                    self.table("competitor_target")
                ),
                params![competitor_id, target_id],
            )
            .map_err(backend)?;
        Ok(())
    }

    /// Append an observation. Returns its `id_history`.
    pub fn insert_observation(&self, obs: &NewObservation) -> Result<i64, StoreError> {
        self.db
            .execute(
                &format!(
                    "INSERT INTO {} (id_competitor, product_title, product_description, price_raw,
                                     product_url, price_amount, price_currency, scraped_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    self.table("price_history")
                ),
                params![
                    obs.competitor_id,
                    obs.title,
                    obs.description,
                    obs.price_raw,
                    obs.url,
                    obs.amount,
                    obs.currency,
                    chrono::Utc::now().to_rfc3339()
                ],
            )
            .map_err(backend)?;
        Ok(self.db.last_insert_rowid())
    }

    /// One stored observation by id.
    pub fn observation(&self, id: i64) -> Result<Option<PriceObservation>, StoreError> {
        let result = self.db.query_row(
            &format!(
                "SELECT id_history, id_competitor, product_title, product_description, price_raw,
                        product_url, price_amount, price_currency
                 FROM {} WHERE id_history = ?1",
                self.table("price_history")
            ),
            params![id],
            observation_from_row,
        );
        match result {
            Ok(obs) => Ok(Some(obs)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(backend(e)),
        }
    }

    /// Stored relations whose product belongs to `target_id`.
    pub fn relations(&self, target_id: i64) -> Result<Vec<Assignment>, StoreError> {
        let mut stmt = self
            .db
            .prepare(&format!(
                "SELECT r.id_product, r.id_history, r.similarity
                 FROM {} r JOIN {} t ON r.id_product = t.id_product
                 WHERE t.id_target = ?1
                 ORDER BY r.id_history, r.id_product",
                self.table("product_history_relation"),
                self.table("target_product")
            ))
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![target_id], |row| {
                Ok(Assignment {
                    product_id: row.get(0)?,
                    observation_id: row.get(1)?,
                    similarity: row.get::<_, f64>(2)? as f32,
                })
            })
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        Ok(rows)
    }

    /// Row counts per table, for diagnostics.
    pub fn table_counts(&self) -> Result<Vec<(String, i64)>, StoreError> {
        ["target_product", "competitor_target", "price_history", "product_history_relation"]
            .iter()
            .map(|name| {
                let table = self.table(name);
                let count: i64 = self
                    .db
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                    .map_err(backend)?;
                Ok((table, count))
            })
            .collect()
    }
}

fn observation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceObservation> {
    Ok(PriceObservation {
        id: row.get(0)?,
        competitor_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        price_raw: row.get(4)?,
        url: row.get(5)?,
        amount: row.get(6)?,
        currency: row.get(7)?,
    })
}

impl CatalogStore for SqliteStore {
    fn target_products(&self, target_id: i64) -> Result<Vec<CatalogProduct>, StoreError> {
        let mut stmt = self
            .db
            .prepare(&format!(
                "SELECT id_product, id_target, name, description, price, url
                 FROM {} WHERE id_target = ?1 ORDER BY id_product",
                self.table("target_product")
            ))
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![target_id], |row| {
                Ok(CatalogProduct {
                    id: row.get(0)?,
                    target_id: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    price: row.get(4)?,
                    url: row.get(5)?,
                })
            })
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        Ok(rows)
    }

    fn competitor_observations(
        &self,
        target_id: i64,
    ) -> Result<Vec<PriceObservation>, StoreError> {
        let mut stmt = self
            .db
            .prepare(&format!(
                "SELECT p.id_history, p.id_competitor, p.product_title, p.product_description,
                        p.price_raw, p.product_url, p.price_amount, p.price_currency
                 FROM {} p JOIN {} c ON p.id_competitor = c.id_competitor
                 WHERE c.id_target = ?1
                 ORDER BY p.id_history",
                self.table("price_history"),
                self.table("competitor_target")
            ))
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![target_id], observation_from_row)
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        Ok(rows)
    }

    fn replace_assignments(&mut self, plan: &MatchPlan) -> Result<usize, StoreError> {
        let relation = self.table("product_history_relation");
        let products = self.table("target_product");
        let now = chrono::Utc::now().to_rfc3339();

        let tx = self.db.transaction().map_err(backend)?;
        {
            // Other target groups may share these observations; only this
            // group's rows are replaced.
            let mut clear = tx
                .prepare(&format!(
                    "DELETE FROM {relation}
                     WHERE id_history = ?1
                       AND id_product IN (SELECT id_product FROM {products} WHERE id_target = ?2)"
                ))
                .map_err(backend)?;
            for id in &plan.observation_ids {
                clear.execute(params![id, plan.target_id]).map_err(backend)?;
            }

            let mut upsert = tx
                .prepare(&format!(
                    "INSERT INTO {relation} (id_product, id_history, similarity, matched_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id_product, id_history)
                     DO UPDATE SET similarity = excluded.similarity, matched_at = excluded.matched_at"
                ))
                .map_err(backend)?;
            for a in &plan.assignments {
                upsert
                    .execute(params![a.product_id, a.observation_id, a.similarity as f64, now])
                    .map_err(backend)?;
            }
        }
        tx.commit().map_err(backend)?;

        Ok(plan.assignments.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir, prefix: &str) -> SqliteStore {
        SqliteStore::open(&dir.path().join("test.db"), prefix).unwrap()
    }

    fn product(id: i64, target_id: i64, name: &str) -> CatalogProduct {
        CatalogProduct {
            id,
            target_id,
            name: name.into(),
            description: String::new(),
            price: "10 DT".into(),
            url: format!("https://shop.test/{id}"),
        }
    }

    fn observation(competitor_id: i64, title: &str) -> NewObservation {
        NewObservation {
            competitor_id,
            title: title.into(),
            description: String::new(),
            price_raw: "12,000 DT".into(),
            url: "https://rival.test/x".into(),
            amount: Some(12.0),
            currency: Some("TND".into()),
        }
    }

    #[test]
    fn test_observation_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir, "");
        let id = s.insert_observation(&observation(3, "Kettle")).unwrap();
        let got = s.observation(id).unwrap().unwrap();
        assert_eq!(got.title, "Kettle");
        assert_eq!(got.amount, Some(12.0));
        assert_eq!(got.currency.as_deref(), Some("TND"));
        assert!(s.observation(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_observations_follow_competitor_links() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir, "shop_");
        s.link_competitor(3, 1).unwrap();
        s.insert_observation(&observation(3, "linked")).unwrap();
        s.insert_observation(&observation(4, "unlinked")).unwrap();
        let obs = s.competitor_observations(1).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].title, "linked");
    }

    #[test]
    fn test_products_by_target() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir, "");
        s.upsert_product(&product(1, 1, "a")).unwrap();
        s.upsert_product(&product(2, 2, "b")).unwrap();
        let products = s.target_products(1).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "a");
    }

    #[test]
    fn test_replace_assignments_is_idempotent_and_drops_stale() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store(&dir, "");
        s.upsert_product(&product(1, 1, "a")).unwrap();
        s.upsert_product(&product(2, 1, "b")).unwrap();

        let first = MatchPlan {
            target_id: 1,
            assignments: vec![Assignment {
                product_id: 1,
                observation_id: 10,
                similarity: 0.9,
            }],
            unmatched: vec![],
            observation_ids: vec![10],
        };
        assert_eq!(s.replace_assignments(&first).unwrap(), 1);
        assert_eq!(s.replace_assignments(&first).unwrap(), 1);
        assert_eq!(s.relations(1).unwrap().len(), 1);

        let moved = MatchPlan {
            assignments: vec![Assignment {
                product_id: 2,
                observation_id: 10,
                similarity: 0.8,
            }],
            ..first.clone()
        };
        s.replace_assignments(&moved).unwrap();
        let rel = s.relations(1).unwrap();
        assert_eq!(rel.len(), 1);
        assert_eq!(rel[0].product_id, 2);

        let dropped = MatchPlan {
            assignments: vec![],
            unmatched: vec![10],
            ..first
        };
        s.replace_assignments(&dropped).unwrap();
        assert!(s.relations(1).unwrap().is_empty());
    }

    fn plan(target_id: i64, pairs: &[(i64, i64)]) -> MatchPlan {
        MatchPlan {
            target_id,
            assignments: pairs
                .iter()
                .map(|&(product_id, observation_id)| Assignment {
                    product_id,
                    observation_id,
                    similarity: 0.9,
                })
                .collect(),
            unmatched: vec![],
            observation_ids: pairs.iter().map(|&(_, obs)| obs).collect(),
        }
    }

    #[test]
    fn test_shared_observation_keeps_other_target_relations() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store(&dir, "");
        s.link_competitor(3, 1).unwrap();
        s.link_competitor(3, 2).unwrap();
        s.upsert_product(&product(1, 1, "kettle")).unwrap();
        s.upsert_product(&product(2, 2, "kettle")).unwrap();

        s.replace_assignments(&plan(2, &[(2, 10)])).unwrap();
        s.replace_assignments(&plan(1, &[(1, 10)])).unwrap();
        assert_eq!(s.relations(1).unwrap().len(), 1);
        assert_eq!(s.relations(2).unwrap().len(), 1);

        // Re-running target 2 leaves target 1 in place.
        s.replace_assignments(&plan(2, &[(2, 10)])).unwrap();
        assert_eq!(s.relations(1).unwrap()[0].product_id, 1);
        assert_eq!(s.relations(2).unwrap()[0].product_id, 2);
    }

    #[test]
    fn test_failed_commit_rolls_back_whole_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store(&dir, "");
        for id in [1, 2, 3] {
            s.upsert_product(&product(id, 1, "p")).unwrap();
        }
        s.replace_assignments(&plan(1, &[(1, 10), (2, 11)])).unwrap();

        s.db
            .execute_batch(
                "CREATE TRIGGER reject_product_3 BEFORE INSERT ON product_history_relation
                 WHEN NEW.id_product = 3
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        // Deletes for 10 and 11 and the upsert of (2, 10) run before the
        // rejected row.
        let err = pricelens::commit(&mut s, plan(1, &[(2, 10), (3, 11)])).unwrap_err();
        match err {
            pricelens::MatchError::Persistence { plan, .. } => {
                assert_eq!(plan.assignments.len(), 2)
            }
            other => panic!("unexpected error: {other}"),
        }

        let rel: Vec<_> = s
            .relations(1)
            .unwrap()
            .into_iter()
            .map(|a| (a.product_id, a.observation_id))
            .collect();
        assert_eq!(rel, vec![(1, 10), (2, 11)]);
    }

    #[test]
    fn test_prefix_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SqliteStore::open(&dir.path().join("x.db"), "bad-prefix").is_err());
    }
}

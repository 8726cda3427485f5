use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use vigil_core::error::Result;
use vigil_core::instance::{
    AppInstance, DbRegionInfo, InstanceId, InstanceStore, Liveness, StoreTransaction,
    TransactionKind,
};

const SELECT_COLUMNS: &str = r#"
    uuid, region, node_id, region_override, url, started_at,
    first_heartbeat, last_heartbeat, last_api_activity,
    cpu_utilization, stop_users_when_idle
"#;

/// Instance store backed by the `app_instances` table.
pub struct PgInstanceStore {
    pool: PgPool,
    region_query: String,
}

impl PgInstanceStore {
    /// Create a new store.
    pub fn new(pool: PgPool, region_query: impl Into<String>) -> Self {
        Self {
            pool,
            region_query: region_query.into(),
        }
    }
}

impl InstanceStore for PgInstanceStore {
    fn begin<'a>(
        &'a self,
        kind: TransactionKind,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn StoreTransaction>>> + Send + 'a>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;

            let mode = match kind {
                TransactionKind::ReadOnly => "SET TRANSACTION READ ONLY",
                TransactionKind::ReadWrite => "SET TRANSACTION READ WRITE",
            };
            sqlx::query(mode).execute(&mut *tx).await?;

            // Name the transaction so it shows up in pg_stat_activity.
            sqlx::query("SELECT set_config('application_name', $1, true)")
                .bind(name)
                .execute(&mut *tx)
                .await?;

            tracing::trace!(transaction = name, kind = kind.as_str(), "Transaction started");

            Ok(Box::new(PgStoreTransaction {
                tx,
                region_query: self.region_query.clone(),
            }) as Box<dyn StoreTransaction>)
        })
    }

    fn list_active(
        &self,
        since: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<AppInstance>>> + Send + '_>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {} FROM app_instances WHERE last_heartbeat >= $1 ORDER BY region, uuid",
                SELECT_COLUMNS
            );
            let rows = sqlx::query(&sql).bind(since).fetch_all(&self.pool).await?;

            rows.iter().map(row_to_instance).collect()
        })
    }
}

/// An open Postgres transaction.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
    region_query: String,
}

impl StoreTransaction for PgStoreTransaction {
    fn upsert<'a>(
        &'a mut self,
        instance: &'a AppInstance,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO app_instances (
                    uuid, region, node_id, region_override, url, started_at,
                    first_heartbeat, last_heartbeat, last_api_activity,
                    cpu_utilization, stop_users_when_idle
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (uuid) DO UPDATE SET
                    region = EXCLUDED.region,
                    node_id = EXCLUDED.node_id,
                    region_override = EXCLUDED.region_override,
                    url = EXCLUDED.url,
                    first_heartbeat = COALESCE(app_instances.first_heartbeat, EXCLUDED.first_heartbeat),
                    last_heartbeat = EXCLUDED.last_heartbeat,
                    last_api_activity = EXCLUDED.last_api_activity,
                    cpu_utilization = EXCLUDED.cpu_utilization,
                    stop_users_when_idle = EXCLUDED.stop_users_when_idle
                "#,
            )
            .bind(instance.uuid.as_uuid())
            .bind(&instance.region)
            .bind(instance.node_id)
            .bind(instance.region_override)
            .bind(&instance.url)
            .bind(instance.started_at)
            .bind(instance.first_heartbeat)
            .bind(instance.last_heartbeat)
            .bind(instance.last_api_activity)
            .bind(instance.cpu_utilization)
            .bind(instance.stop_users_when_idle)
            .execute(&mut *self.tx)
            .await?;

            Ok(())
        })
    }

    fn delete_dead_app_instances(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM app_instances WHERE last_heartbeat < $1")
                .bind(cutoff)
                .execute(&mut *self.tx)
                .await?;

            Ok(result.rows_affected())
        })
    }

    fn count_active(
        &mut self,
        liveness: Liveness,
        since: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT COUNT(*) AS active FROM app_instances WHERE {} >= $1",
                liveness.column()
            );
            let row = sqlx::query(&sql)
                .bind(since)
                .fetch_one(&mut *self.tx)
                .await?;

            let active: i64 = row.try_get("active")?;
            Ok(active.max(0) as u64)
        })
    }

    fn current_db_node_region(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<DbRegionInfo>> + Send + '_>> {
        Box::pin(async move {
            let query = self.region_query.clone();
            let row = sqlx::query(&query).fetch_one(&mut *self.tx).await?;

            Ok(DbRegionInfo {
                region_name: row.try_get("region_name")?,
                node_id: row.try_get("node_id")?,
            })
        })
    }

    fn commit(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        let this = *self;
        Box::pin(async move {
            this.tx.commit().await?;
            Ok(())
        })
    }
}

fn row_to_instance(row: &PgRow) -> Result<AppInstance> {
    let uuid: Uuid = row.try_get("uuid")?;

    Ok(AppInstance {
        uuid: InstanceId::from_uuid(uuid),
        region: row.try_get("region")?,
        node_id: row.try_get("node_id")?,
        region_override: row.try_get("region_override")?,
        url: row.try_get("url")?,
        started_at: row.try_get("started_at")?,
        first_heartbeat: row.try_get("first_heartbeat")?,
        last_heartbeat: row.try_get("last_heartbeat")?,
        last_api_activity: row.try_get("last_api_activity")?,
        cpu_utilization: row.try_get("cpu_utilization")?,
        stop_users_when_idle: row.try_get("stop_users_when_idle")?,
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Duration;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
    use vigil_core::config::InstanceConfig;

    use super::*;

    const REGION_QUERY: &str = "SELECT 'US' AS region_name, 1::BIGINT AS node_id";

    const CREATE_TABLE: &str = r#"
        CREATE TABLE app_instances (
            uuid UUID PRIMARY KEY,
            region TEXT NOT NULL,
            node_id BIGINT NOT NULL,
            region_override BOOLEAN NOT NULL,
            url TEXT,
            started_at TIMESTAMPTZ NOT NULL,
            first_heartbeat TIMESTAMPTZ,
            last_heartbeat TIMESTAMPTZ NOT NULL,
            last_api_activity TIMESTAMPTZ NOT NULL,
            cpu_utilization REAL NOT NULL,
            stop_users_when_idle BOOLEAN NOT NULL
        )
    "#;

    /// A throwaway schema holding its own `app_instances` table.
    struct TestSchema {
        pool: PgPool,
        name: String,
    }

    impl TestSchema {
        /// Connect using TEST_DATABASE_URL. `None` when it is not set.
        async fn from_env() -> Option<Self> {
            let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
                eprintln!("TEST_DATABASE_URL not set, skipping Postgres store test");
                return None;
            };

            let name = format!("vigil_test_{}", Uuid::new_v4().simple());
            let options = PgConnectOptions::from_str(&url)
                .unwrap()
                .options([("search_path", name.as_str())]);
            let pool = PgPoolOptions::new()
                .max_connections(4)
                .connect_with(options)
                .await
                .unwrap();

            sqlx::query(&format!("CREATE SCHEMA {}", name))
                .execute(&pool)
                .await
                .unwrap();
            sqlx::query(CREATE_TABLE).execute(&pool).await.unwrap();

            Some(Self { pool, name })
        }

        fn store(&self, region_query: &str) -> PgInstanceStore {
            PgInstanceStore::new(self.pool.clone(), region_query)
        }

        async fn drop_schema(self) {
            sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.name))
                .execute(&self.pool)
                .await
                .unwrap();
            self.pool.close().await;
        }
    }

    // Postgres keeps microseconds, so test timestamps stay on whole seconds.
    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn instance_at(heartbeat: DateTime<Utc>, api_activity: DateTime<Utc>) -> AppInstance {
        let mut instance = AppInstance::from_config(&InstanceConfig::default(), base_time());
        instance.region = "US".to_string();
        instance.node_id = 1;
        instance.first_heartbeat = Some(heartbeat);
        instance.last_heartbeat = heartbeat;
        instance.last_api_activity = api_activity;
        instance
    }

    async fn write(store: &PgInstanceStore, instances: &[AppInstance]) {
        let mut tx = store
            .begin(TransactionKind::ReadWrite, "seed")
            .await
            .unwrap();
        for instance in instances {
            tx.upsert(instance).await.unwrap();
        }
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_first_heartbeat_is_written_once() {
        let Some(schema) = TestSchema::from_env().await else {
            return;
        };
        let store = schema.store(REGION_QUERY);
        let t0 = base_time();

        let mut instance = instance_at(t0 + Duration::seconds(10), t0);
        write(&store, &[instance.clone()]).await;

        instance.first_heartbeat = Some(t0 + Duration::seconds(20));
        instance.last_heartbeat = t0 + Duration::seconds(20);
        instance.cpu_utilization = 42.5;
        write(&store, &[instance.clone()]).await;

        let stored = store.list_active(t0).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].uuid, instance.uuid);
        assert_eq!(stored[0].first_heartbeat, Some(t0 + Duration::seconds(10)));
        assert_eq!(stored[0].last_heartbeat, t0 + Duration::seconds(20));
        assert_eq!(stored[0].cpu_utilization, 42.5);

        schema.drop_schema().await;
    }

    #[tokio::test]
    async fn test_purge_and_count_active() {
        let Some(schema) = TestSchema::from_env().await else {
            return;
        };
        let store = schema.store(REGION_QUERY);
        let now = base_time();

        let busy = instance_at(now, now);
        let quiet = instance_at(now, now - Duration::seconds(600));
        let dead = instance_at(now - Duration::seconds(600), now - Duration::seconds(600));
        write(&store, &[busy.clone(), quiet.clone(), dead]).await;

        let mut tx = store
            .begin(TransactionKind::ReadWrite, "heartbeat")
            .await
            .unwrap();
        assert_eq!(
            tx.count_active(Liveness::Heartbeat, now - Duration::seconds(30))
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            tx.count_active(Liveness::ApiActivity, now - Duration::seconds(300))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            tx.delete_dead_app_instances(now - Duration::seconds(300))
                .await
                .unwrap(),
            1
        );
        tx.commit().await.unwrap();

        let remaining = store
            .list_active(now - Duration::seconds(3600))
            .await
            .unwrap();
        let mut ids: Vec<_> = remaining.iter().map(|i| i.uuid).collect();
        ids.sort();
        let mut expected = vec![busy.uuid, quiet.uuid];
        expected.sort();
        assert_eq!(ids, expected);

        schema.drop_schema().await;
    }

    #[tokio::test]
    async fn test_read_only_transaction_rejects_writes() {
        let Some(schema) = TestSchema::from_env().await else {
            return;
        };
        let store = schema.store(REGION_QUERY);
        let now = base_time();

        let mut tx = store
            .begin(TransactionKind::ReadOnly, "wake")
            .await
            .unwrap();
        assert!(tx.upsert(&instance_at(now, now)).await.is_err());
        drop(tx);

        assert!(store.list_active(now).await.unwrap().is_empty());

        schema.drop_schema().await;
    }

    #[tokio::test]
    async fn test_transaction_name_is_visible_inside_it() {
        let Some(schema) = TestSchema::from_env().await else {
            return;
        };
        let store = schema.store(
            "SELECT current_setting('application_name') AS region_name, 7::BIGINT AS node_id",
        );

        let mut tx = store
            .begin(TransactionKind::ReadWrite, "heartbeat")
            .await
            .unwrap();
        let info = tx.current_db_node_region().await.unwrap();
        assert_eq!(info.region_name, "heartbeat");
        assert_eq!(info.node_id, 7);
        tx.commit().await.unwrap();

        schema.drop_schema().await;
    }
}

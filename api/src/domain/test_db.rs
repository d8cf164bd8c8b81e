//! Throwaway Postgres schemas for query tests.
//!
//! Tests connect to `TEST_DATABASE_URL`; each `TestDb` migrates a fresh schema
//! and `finish` drops it again. Without the variable, tests print a skip
//! marker and return early. A configured database that fails to set up is a
//! test failure, so CI breakage is not masked.

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use super::videos::{self, NewVideo, Video};
use crate::services::error::BoxError;

pub struct TestDb {
    pub pool: PgPool,
    admin: PgPool,
    schema: String,
}

impl TestDb {
    pub async fn new() -> Option<TestDb> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("SKIP-TEST-DB: TEST_DATABASE_URL not set");
            return None;
        };
        match Self::create(&url).await {
            Ok(db) => Some(db),
            Err(e) => panic!("Test database setup failed: {e}. Unset TEST_DATABASE_URL to skip."),
        }
    }

    async fn create(url: &str) -> Result<TestDb, BoxError> {
        let admin = PgPoolOptions::new().max_connections(1).connect(url).await?;
        let schema = format!("vidcast_test_{:08x}", rand::random::<u32>());
        sqlx::query(&format!("CREATE SCHEMA {schema}"))
            .execute(&admin)
            .await?;

        let options = url
            .parse::<PgConnectOptions>()?
            .options([("search_path", schema.as_str())]);
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        sqlx::migrate!().run(&pool).await?;

        Ok(TestDb {
            pool,
            admin,
            schema,
        })
    }

    pub async fn seed_video(&self, media_url: &str) -> Video {
        videos::create_video(
            &self.pool,
            NewVideo {
                title: "Launch day",
                description: "Launch day description",
                media_url,
                media_id: "videos/1_launch.mp4",
                tags: &["launch".to_string()],
            },
        )
        .await
        .unwrap()
    }

    pub async fn finish(self) {
        self.pool.close().await;
        let drop = format!("DROP SCHEMA {} CASCADE", self.schema);
        if let Err(e) = sqlx::query(&drop).execute(&self.admin).await {
            eprintln!("failed to drop test schema {}: {e}", self.schema);
        }
        self.admin.close().await;
    }
}

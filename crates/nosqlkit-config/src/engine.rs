use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// NoSQL engines with a managed lifecycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, EnumString,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EngineKind {
    /// Apache CouchDB.
    CouchDb,
    /// Elasticsearch.
    Elasticsearch,
    /// Apache HBase.
    HBase,
    /// Infinispan server.
    Infinispan,
    /// Redis.
    Redis,
    /// MongoDB (`mongod`).
    MongoDb,
    /// Neo4j.
    Neo4j,
    /// DynamoDB Local.
    DynamoDb,
    /// InfluxDB (`influxd`).
    InfluxDb,
}

/// Errors encountered while parsing an [`EngineKind`] from text.
pub type EngineKindParseError = strum::ParseError;

impl EngineKind {
    /// Every supported engine, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::CouchDb,
        Self::Elasticsearch,
        Self::HBase,
        Self::Infinispan,
        Self::Redis,
        Self::MongoDb,
        Self::Neo4j,
        Self::DynamoDb,
        Self::InfluxDb,
    ];

    /// Port the engine listens on when none is configured.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::CouchDb => 5984,
            Self::Elasticsearch => 9200,
            Self::HBase => 16000,
            Self::Infinispan => 11222,
            Self::Redis => 6379,
            Self::MongoDb => 27017,
            Self::Neo4j => 7474,
            Self::DynamoDb => 8000,
            Self::InfluxDb => 8086,
        }
    }

    /// Environment variable naming the engine's installation directory.
    #[must_use]
    pub const fn home_env_var(self) -> &'static str {
        match self {
            Self::CouchDb => "COUCHDB_HOME",
            Self::Elasticsearch => "ES_HOME",
            Self::HBase => "HBASE_HOME",
            Self::Infinispan => "INFINISPAN_HOME",
            Self::Redis => "REDIS_HOME",
            Self::MongoDb => "MONGO_HOME",
            Self::Neo4j => "NEO4J_HOME",
            Self::DynamoDb => "DYNAMODB_HOME",
            Self::InfluxDb => "INFLUXDB_HOME",
        }
    }

    /// Short name used for working directories and log fields.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::CouchDb => "couchdb",
            Self::Elasticsearch => "elasticsearch",
            Self::HBase => "hbase",
            Self::Infinispan => "infinispan",
            Self::Redis => "redis",
            Self::MongoDb => "mongodb",
            Self::Neo4j => "neo4j",
            Self::DynamoDb => "dynamodb",
            Self::InfluxDb => "influxdb",
        }
    }
}

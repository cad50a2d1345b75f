//! Datasets over a set of remote objects.
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use datafusion::arrow::datatypes::{FieldRef, Schema, SchemaRef};
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::errors::{Result, SkyhookError};
use crate::fragment::Fragment;
use crate::partitioning::HivePartitioning;
use crate::predicate::Predicate;
use crate::projection::check_projectable;
use crate::resolver::{ObjectResolver, ObjectTarget};
use crate::scanner::ScannerBuilder;
use crate::task::{Executable, ReadSchemaTask};

/// An object to build a fragment from.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedObject {
    pub target: ObjectTarget,
    /// Expression every row of the object is known to satisfy.
    pub partition_predicate: Predicate,
}

impl From<ObjectTarget> for GeneratedObject {
    fn from(target: ObjectTarget) -> Self {
        GeneratedObject {
            target,
            partition_predicate: Predicate::always_true(),
        }
    }
}

pub type ObjectIter = Box<dyn Iterator<Item = GeneratedObject> + Send>;
pub type FragmentIter = Box<dyn Iterator<Item = Fragment> + Send>;

/// Produces the objects making up a dataset.
///
/// Every call returns a fresh iterator over the same objects.
pub trait ObjectGenerator: Debug + Send + Sync {
    fn objects(&self) -> ObjectIter;
}

/// Generator over a fixed list of objects.
#[derive(Debug, Clone)]
pub struct VectorObjectGenerator {
    objects: Arc<[GeneratedObject]>,
}

impl VectorObjectGenerator {
    pub fn new(targets: impl IntoIterator<Item = ObjectTarget>) -> Self {
        VectorObjectGenerator {
            objects: targets.into_iter().map(GeneratedObject::from).collect(),
        }
    }

    /// Objects with a partition predicate each.
    pub fn with_partitions(objects: impl IntoIterator<Item = (ObjectTarget, Predicate)>) -> Self {
        VectorObjectGenerator {
            objects: objects
                .into_iter()
                .map(|(target, partition_predicate)| GeneratedObject {
                    target,
                    partition_predicate,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectGenerator for VectorObjectGenerator {
    fn objects(&self) -> ObjectIter {
        let objects = self.objects.clone();
        Box::new((0..objects.len()).map(move |idx| objects[idx].clone()))
    }
}

/// A queryable collection of fragments.
pub trait FragmentSource {
    fn schema(&self) -> &SchemaRef;

    /// Enumerate fragments. Fragments are not pruned by `predicate`.
    fn get_fragments(&self, predicate: &Predicate) -> Result<FragmentIter>;

    /// View of this source with a different (projectable) schema.
    fn replace_schema(&self, schema: SchemaRef) -> Result<Self>
    where
        Self: Sized;
}

#[derive(Debug, Clone)]
pub struct Dataset {
    schema: SchemaRef,
    objects: Arc<dyn ObjectGenerator>,
    resolver: ObjectResolver,
}

impl Dataset {
    pub fn new(
        schema: SchemaRef,
        objects: Arc<dyn ObjectGenerator>,
        resolver: ObjectResolver,
    ) -> Self {
        Dataset {
            schema,
            objects,
            resolver,
        }
    }

    /// Dataset over a fixed list of targets without partition information.
    pub fn from_targets(
        schema: SchemaRef,
        targets: impl IntoIterator<Item = ObjectTarget>,
        resolver: ObjectResolver,
    ) -> Self {
        Self::new(
            schema,
            Arc::new(VectorObjectGenerator::new(targets)),
            resolver,
        )
    }

    pub fn object_generator(&self) -> &Arc<dyn ObjectGenerator> {
        &self.objects
    }

    pub fn resolver(&self) -> &ObjectResolver {
        &self.resolver
    }

    pub fn new_scan(&self) -> ScannerBuilder {
        ScannerBuilder::new(self.clone())
    }
}

impl FragmentSource for Dataset {
    fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn get_fragments(&self, _predicate: &Predicate) -> Result<FragmentIter> {
        let schema = self.schema.clone();
        let resolver = self.resolver.clone();

        Ok(Box::new(self.objects.objects().map(move |obj| {
            Fragment::new(
                schema.clone(),
                obj.target,
                obj.partition_predicate,
                resolver.clone(),
            )
        })))
    }

    fn replace_schema(&self, schema: SchemaRef) -> Result<Self> {
        check_projectable(&self.schema, &schema)?;
        Ok(Dataset {
            schema,
            objects: self.objects.clone(),
            resolver: self.resolver.clone(),
        })
    }
}

/// Builds a path backed dataset from files found in the namespace.
#[derive(Debug, Clone)]
pub struct DatasetFactory {
    resolver: ObjectResolver,
    /// Directory the paths were discovered under, empty for explicit paths.
    root: String,
    paths: Vec<String>,
    partitioning: Option<HivePartitioning>,
    timeout: Option<Duration>,
}

impl DatasetFactory {
    /// Find every file under `root`.
    pub async fn discover(resolver: ObjectResolver, root: &str) -> Result<Self> {
        let paths = resolver.list_files(root).await?;
        info!(%root, num_files = paths.len(), "discovered dataset files");
        let mut factory = Self::from_paths(resolver, paths);
        factory.root = root.to_string();
        Ok(factory)
    }

    pub fn from_paths(resolver: ObjectResolver, paths: Vec<String>) -> Self {
        DatasetFactory {
            resolver,
            root: String::new(),
            paths,
            partitioning: None,
            timeout: None,
        }
    }

    /// Read partition columns from `key=value` directories below the root.
    pub fn with_partitioning(mut self, partitioning: HivePartitioning) -> Self {
        self.partitioning = Some(partitioning);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Read the physical schema of every file, in path order.
    pub async fn inspect_schemas(&self) -> Result<Vec<SchemaRef>> {
        let tasks = self.paths.iter().map(|path| {
            let mut task = ReadSchemaTask::new(ObjectTarget::path(path), self.resolver.clone());
            if let Some(timeout) = self.timeout {
                task = task.with_timeout(timeout);
            }
            async move { task.execute().await }
        });
        try_join_all(tasks).await
    }

    /// One object per path, carrying its partition predicate.
    pub fn objects(&self) -> Result<Vec<GeneratedObject>> {
        self.paths
            .iter()
            .map(|path| {
                let partition_predicate = match &self.partitioning {
                    Some(partitioning) => partitioning.predicate(&self.root, path)?,
                    None => Predicate::always_true(),
                };
                Ok(GeneratedObject {
                    target: ObjectTarget::path(path),
                    partition_predicate,
                })
            })
            .collect()
    }

    /// Finish with the union of all inspected schemas, followed by the
    /// partition fields.
    ///
    /// Fields missing from some files become nullable. An empty file set
    /// produces a dataset with only the partition fields.
    pub async fn finish(self) -> Result<Dataset> {
        let schemas = self.inspect_schemas().await?;
        let mut schema = unify_schemas(&schemas)?;
        if let Some(partitioning) = &self.partitioning {
            schema = with_partition_fields(&schema, partitioning.schema())?;
        }
        debug!(?schema, "unified dataset schema");
        self.finish_with_schema(schema)
    }

    pub fn finish_with_schema(self, schema: SchemaRef) -> Result<Dataset> {
        let objects = self.objects()?;
        let generator = VectorObjectGenerator {
            objects: objects.into(),
        };
        Ok(Dataset::new(schema, Arc::new(generator), self.resolver))
    }
}

fn unify_schemas(schemas: &[SchemaRef]) -> Result<SchemaRef> {
    let merged = Schema::try_merge(schemas.iter().map(|s| s.as_ref().clone()))?;

    let fields: Vec<FieldRef> = merged
        .fields()
        .iter()
        .map(|field| {
            let everywhere = schemas
                .iter()
                .all(|s| s.field_with_name(field.name()).is_ok());
            if everywhere || field.is_nullable() {
                field.clone()
            } else {
                Arc::new(field.as_ref().clone().with_nullable(true))
            }
        })
        .collect();

    Ok(Arc::new(Schema::new_with_metadata(
        fields,
        merged.metadata().clone(),
    )))
}

/// Append partition fields not stored in the files. Partition fields are
/// nullable, a file may sit outside any `key=value` directory.
fn with_partition_fields(schema: &SchemaRef, partitions: &SchemaRef) -> Result<SchemaRef> {
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();

    for field in partitions.fields() {
        match schema.field_with_name(field.name()) {
            Ok(stored) if stored.data_type() != field.data_type() => {
                return Err(SkyhookError::Partitioning(format!(
                    "partition field '{}' is {}, files store it as {}",
                    field.name(),
                    field.data_type(),
                    stored.data_type()
                )));
            }
            Ok(_) => (),
            Err(_) => fields.push(Arc::new(field.as_ref().clone().with_nullable(true))),
        }
    }

    Ok(Arc::new(Schema::new_with_metadata(
        fields,
        schema.metadata().clone(),
    )))
}

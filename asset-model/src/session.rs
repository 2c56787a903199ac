//! 会话（Session）
//!
//! 绑定元模型、查询/命令服务、类型注册表、记录缓存与配置，是实体句柄的工作单元。
//!
//! 单线程协作模型：会话内部以 `Rc`/`RefCell` 共享状态（`!Send`），
//! 需要并发的调用方应每个线程使用一个会话。所有远端调用都是同步的。
//!
use crate::asset::Asset;
use crate::cache::{ContainerRef, RecordCache};
use crate::config::SessionConfig;
use crate::error::{DomainError, DomainResult};
use crate::oid::Oid;
use crate::registry::{AssetKind, Materialized, TypeRegistry};
use crate::remote::{CommandService, Query, QueryService};
use crate::schema::{AssetTypeDescriptor, MetaModel};
use crate::value::AttributeValue;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

struct SessionInner {
    meta: Arc<dyn MetaModel>,
    query: Arc<dyn QueryService>,
    command: Arc<dyn CommandService>,
    registry: TypeRegistry,
    config: SessionConfig,
    cache: RefCell<RecordCache>,
}

#[bon::bon]
impl Session {
    #[builder]
    pub fn new(
        meta: Arc<dyn MetaModel>,
        query: Arc<dyn QueryService>,
        command: Arc<dyn CommandService>,
        registry: TypeRegistry,
        #[builder(default)] config: SessionConfig,
    ) -> Self {
        Self {
            inner: Rc::new(SessionInner {
                meta,
                query,
                command,
                registry,
                config,
                cache: RefCell::new(RecordCache::new()),
            }),
        }
    }
}

impl Session {
    /// 同一个存储同时充当元模型、查询与命令服务
    pub fn with_store<S>(store: Arc<S>, registry: TypeRegistry, config: SessionConfig) -> Self
    where
        S: MetaModel + QueryService + CommandService + 'static,
    {
        Self::builder()
            .meta(store.clone())
            .query(store.clone())
            .command(store)
            .registry(registry)
            .config(config)
            .build()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    pub fn asset_type(&self, token: &str) -> DomainResult<Arc<AssetTypeDescriptor>> {
        self.inner.meta.asset_type(token)
    }

    pub(crate) fn meta_model(&self) -> &dyn MetaModel {
        self.inner.meta.as_ref()
    }

    pub(crate) fn query_service(&self) -> &dyn QueryService {
        self.inner.query.as_ref()
    }

    pub(crate) fn command_service(&self) -> &dyn CommandService {
        self.inner.command.as_ref()
    }

    // --- 缓存 ---

    pub(crate) fn container(&self, oid: &Oid) -> ContainerRef {
        self.inner
            .cache
            .borrow_mut()
            .get_or_create(oid, oid.asset_type())
    }

    pub(crate) fn cached(&self, oid: &Oid) -> Option<ContainerRef> {
        self.inner.cache.borrow().lookup(oid)
    }

    pub(crate) fn rekey(&self, old: &Oid, new: &Oid) -> DomainResult<()> {
        self.inner.cache.borrow_mut().rekey(old, new)
    }

    pub fn is_cached(&self, oid: &Oid) -> bool {
        self.inner.cache.borrow().contains(oid)
    }

    pub fn cached_count(&self) -> usize {
        self.inner.cache.borrow().len()
    }

    /// 使某个标识的单个属性（`None` 表示全部属性）失效
    pub fn invalidate(&self, oid: &Oid, attribute: Option<&str>) {
        if let Some(container) = self.cached(oid) {
            let mut container = container.borrow_mut();
            match attribute {
                Some(name) => container.invalidate(name),
                None => container.invalidate_all(),
            }
        }
    }

    pub fn invalidate_all(&self) {
        self.inner.cache.borrow().invalidate_all();
    }

    pub(crate) fn handle(&self, oid: &Oid) -> Asset {
        Asset::new(self.clone(), self.container(oid))
    }

    // --- 实体 ---

    /// 新建实体：临时标识 + 空容器；判别值变体会暂存自己的判别值
    pub fn create<K: AssetKind>(&self) -> DomainResult<K> {
        self.asset_type(K::ASSET_TYPE)?;
        let oid = Oid::ephemeral(K::ASSET_TYPE);
        let container = self.container(&oid);
        if let Some(discriminant) = K::DISCRIMINANT {
            container.borrow_mut().set(
                self.config().state_attribute(),
                AttributeValue::Integer(discriminant),
            );
        }
        tracing::debug!(%oid, kind = std::any::type_name::<K>(), "entity created");
        Ok(K::from_asset(Asset::new(self.clone(), container)))
    }

    /// 按标识取实体（校验存在性）；记录不存在或解析出的类型不是 `K` 时返回 `None`
    pub fn get<K: AssetKind>(&self, oid: &Oid) -> DomainResult<Option<K>> {
        Ok(self
            .get_dyn(oid)?
            .and_then(|materialized| materialized.downcast::<K>().ok()))
    }

    /// 按标识取实体，返回类型擦除的实例
    pub fn get_dyn(&self, oid: &Oid) -> DomainResult<Option<Materialized>> {
        self.materialize(oid, true)
    }

    /// 批量取实体，缺失项静默跳过
    pub fn get_many<'a, K, I>(&self, oids: I) -> DomainResult<Vec<K>>
    where
        K: AssetKind,
        I: IntoIterator<Item = &'a Oid>,
    {
        let mut found = Vec::new();
        for oid in oids {
            if let Some(kind) = self.get::<K>(oid)? {
                found.push(kind);
            }
        }
        Ok(found)
    }

    pub(crate) fn materialize(&self, oid: &Oid, validate: bool) -> DomainResult<Option<Materialized>> {
        let Some(registration) = self.resolve(oid, validate)? else {
            return Ok(None);
        };
        Ok(Some(registration.instantiate(self.handle(oid))))
    }

    /// 执行查询并按结果乐观实例化（存在性已由查询证明）；解析为其他变体的记录被跳过
    pub fn query<K: AssetKind>(&self, query: Query) -> DomainResult<Vec<K>> {
        if query.asset_type() != K::ASSET_TYPE {
            return Err(DomainError::TypeMismatch {
                expected: K::ASSET_TYPE.to_string(),
                found: query.asset_type().to_string(),
            });
        }
        let mut query = query.with_defaults(K::DEFAULT_SELECTION, K::DEFAULT_ORDER);
        if self.registry().has_discriminated(K::ASSET_TYPE) {
            query.ensure_selected(self.config().state_attribute());
        }

        tracing::debug!(asset_type = K::ASSET_TYPE, "query");
        let records = self.query_service().query(&query)?;
        let mut results = Vec::with_capacity(records.len());
        for record in &records {
            self.container(&record.oid).borrow_mut().merge_record(record);
            let Some(registration) = self.resolve(&record.oid, false)? else {
                continue;
            };
            if registration.is::<K>() {
                results.push(K::from_asset(self.handle(&record.oid)));
            }
        }
        Ok(results)
    }
}

//! Registered document models and the JSON normalisation applied to every
//! document leaving the service.
//!
//! Document shapes are owned by the API layer. What lives here is the
//! storage contract each model declares: its collection, its indexes, and
//! the fields that must never be serialised.

use mongodb::{
    bson::{Bson, Document},
    options::IndexOptions,
    Database, IndexModel,
};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// A single index declaration.
#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub name: &'static str,
    /// `(field, direction)` pairs; direction is `1` or `-1`.
    pub keys: &'static [(&'static str, i32)],
    pub unique: bool,
}

/// A registered model.
#[derive(Debug, Clone, Copy)]
pub struct ModelSpec {
    pub collection: &'static str,
    pub indexes: &'static [IndexSpec],
    /// Top-level fields stripped by [`ModelSpec::to_json`].
    pub private_fields: &'static [&'static str],
}

const fn index(name: &'static str, keys: &'static [(&'static str, i32)], unique: bool) -> IndexSpec {
    IndexSpec { name, keys, unique }
}

pub const PRODUCT_TAGS: ModelSpec = ModelSpec {
    collection: "producttags",
    indexes: &[index("uniq_product_tag_slug", &[("slug", 1)], true)],
    private_fields: &[],
};

pub const ORDER_TAGS: ModelSpec = ModelSpec {
    collection: "ordertags",
    indexes: &[index("uniq_order_tag_name", &[("name", 1)], true)],
    private_fields: &[],
};

pub const USERS: ModelSpec = ModelSpec {
    collection: "users",
    indexes: &[
        index("uniq_user_phone", &[("phone", 1)], true),
        index("idx_user_role", &[("role", 1)], false),
    ],
    private_fields: &["password", "salt"],
};

pub const ORDERS: ModelSpec = ModelSpec {
    collection: "orders",
    indexes: &[
        index("uniq_order_code", &[("orderCode", 1)], true),
        index("idx_order_customer_created", &[("customerId", 1), ("createdAt", -1)], false),
    ],
    private_fields: &[],
};

pub const PRODUCTS: ModelSpec = ModelSpec {
    collection: "products",
    indexes: &[
        index("uniq_product_slug", &[("slug", 1)], true),
        index("idx_product_sku", &[("sku", 1)], false),
    ],
    private_fields: &[],
};

pub const RELATED_PRODUCTS: ModelSpec = ModelSpec {
    collection: "relatedproducts",
    indexes: &[index("idx_related_product", &[("productId", 1)], false)],
    private_fields: &[],
};

pub const SELLER_PROCESS_RESULTS: ModelSpec = ModelSpec {
    collection: "sellerprocessresults",
    indexes: &[index("idx_seller_result_order", &[("orderId", 1)], false)],
    private_fields: &[],
};

pub const INVENTORIES: ModelSpec = ModelSpec {
    collection: "inventories",
    indexes: &[index(
        "uniq_inventory_product_warehouse",
        &[("productId", 1), ("warehouseId", 1)],
        true,
    )],
    private_fields: &[],
};

pub const CUSTOMER_ADDRESSES: ModelSpec = ModelSpec {
    collection: "customeraddresses",
    indexes: &[index("idx_address_customer", &[("customerId", 1)], false)],
    private_fields: &[],
};

pub const BLOG_CATEGORIES: ModelSpec = ModelSpec {
    collection: "blogcategories",
    indexes: &[index("uniq_blog_category_slug", &[("slug", 1)], true)],
    private_fields: &[],
};

pub const REDIRECT_CONFIGS: ModelSpec = ModelSpec {
    collection: "redirectconfigs",
    indexes: &[index("uniq_redirect_from", &[("from", 1)], true)],
    private_fields: &[],
};

pub const SETTINGS: ModelSpec = ModelSpec {
    collection: "settings",
    indexes: &[index("uniq_setting_key", &[("key", 1)], true)],
    private_fields: &[],
};

/// Every model the service registers at startup.
pub const ALL: &[ModelSpec] = &[
    PRODUCT_TAGS,
    ORDER_TAGS,
    USERS,
    ORDERS,
    PRODUCTS,
    RELATED_PRODUCTS,
    SELLER_PROCESS_RESULTS,
    INVENTORIES,
    CUSTOMER_ADDRESSES,
    BLOG_CATEGORIES,
    REDIRECT_CONFIGS,
    SETTINGS,
];

impl ModelSpec {
    /// Driver index models for this collection.
    pub fn index_models(&self) -> Vec<IndexModel> {
        self.indexes
            .iter()
            .map(|spec| {
                let mut keys = Document::new();
                for (field, direction) in spec.keys {
                    keys.insert(*field, *direction);
                }
                IndexModel::builder()
                    .keys(keys)
                    .options(
                        IndexOptions::builder()
                            .name(Some(spec.name.to_owned()))
                            .unique(spec.unique.then_some(true))
                            .build(),
                    )
                    .build()
            })
            .collect()
    }

    /// Convert a stored document to its public JSON shape.
    ///
    /// - `_id` is renamed to `id`; ObjectIds become hex strings.
    /// - `__v` is removed at every level.
    /// - [`ModelSpec::private_fields`] are removed at the top level.
    /// - Dates become RFC 3339 strings.
    pub fn to_json(&self, mut doc: Document) -> Value {
        for field in self.private_fields {
            doc.remove(*field);
        }
        document_to_json(doc)
    }
}

/// Create every declared index. Failures are logged per collection and do
/// not abort startup.
pub async fn register_all(db: &Database) {
    for model in ALL {
        let collection = db.collection::<Document>(model.collection);
        match collection.create_indexes(model.index_models(), None).await {
            Ok(result) => info!(
                collection = model.collection,
                indexes = result.index_names.len(),
                "model registered"
            ),
            Err(e) => warn!(
                collection = model.collection,
                error = %e,
                "failed to create indexes"
            ),
        }
    }
}

fn document_to_json(doc: Document) -> Value {
    let mut out = Map::with_capacity(doc.len());
    for (key, value) in doc {
        match key.as_str() {
            "__v" => {}
            "_id" => {
                out.insert("id".to_owned(), bson_to_json(value));
            }
            _ => {
                out.insert(key, bson_to_json(value));
            }
        }
    }
    Value::Object(out)
}

fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => Value::String(s),
            Err(_) => Value::from(dt.timestamp_millis()),
        },
        Bson::Document(inner) => document_to_json(inner),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

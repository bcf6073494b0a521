//! Product listing for the shop page.

use crate::error::Result;
use crate::store::{Product, ProductCatalog, ProductOrder};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Listing mode selected by the `sort` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShopSort {
    /// Flat list in storage order.
    #[default]
    Default,
    /// Grouped by tag, ordered by the tags column.
    Video,
}

impl ShopSort {
    /// `video` selects grouping. Anything else is the flat listing.
    pub fn parse(raw: &str) -> Self {
        if raw == "video" {
            ShopSort::Video
        } else {
            ShopSort::Default
        }
    }
}

/// A product as the shop page renders it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShopProduct {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    /// Tags used for grouping: all but the last.
    #[serde(rename = "groupTags")]
    pub group_tags: Vec<String>,
    pub link: String,
    pub image_data: Option<String>,
}

impl From<Product> for ShopProduct {
    fn from(product: Product) -> Self {
        Self {
            group_tags: group_tags(&product.tags),
            id: product.id,
            title: product.title,
            tags: product.tags,
            link: product.link,
            image_data: product.image_data,
        }
    }
}

/// Response body for the shop listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ShopListing {
    Flat {
        products: Vec<ShopProduct>,
        #[serde(rename = "sortOption")]
        sort_option: String,
    },
    Grouped {
        #[serde(rename = "groupedProducts")]
        grouped_products: BTreeMap<String, Vec<ShopProduct>>,
        #[serde(rename = "sortOption")]
        sort_option: String,
    },
}

/// All tags except the last one.
pub fn group_tags(tags: &[String]) -> Vec<String> {
    tags.split_last()
        .map(|(_, rest)| rest.to_vec())
        .unwrap_or_default()
}

/// Group products under each of their group tags.
///
/// A product with several group tags appears in each group; one with none
/// appears in no group.
pub fn group_by_tag(products: Vec<ShopProduct>) -> BTreeMap<String, Vec<ShopProduct>> {
    let mut groups: BTreeMap<String, Vec<ShopProduct>> = BTreeMap::new();
    for product in products {
        for tag in &product.group_tags {
            groups.entry(tag.clone()).or_default().push(product.clone());
        }
    }
    groups
}

/// Build the listing for `sort_option` (the raw `sort` parameter).
#[instrument(skip(catalog))]
pub async fn list_products(catalog: &dyn ProductCatalog, sort_option: &str) -> Result<ShopListing> {
    let sort = ShopSort::parse(sort_option);
    let order = match sort {
        ShopSort::Video => ProductOrder::ByTags,
        ShopSort::Default => ProductOrder::Unordered,
    };

    let products: Vec<ShopProduct> = catalog
        .list_products(order)
        .await?
        .into_iter()
        .map(ShopProduct::from)
        .collect();
    debug!("Listing {} products", products.len());

    let sort_option = sort_option.to_string();
    Ok(match sort {
        ShopSort::Video => ShopListing::Grouped {
            grouped_products: group_by_tag(products),
            sort_option,
        },
        ShopSort::Default => ShopListing::Flat {
            products,
            sort_option,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn product(id: &str, tags: &[&str]) -> Product {
        Product {
            id: id.to_string(),
            title: format!("Product {}", id),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            link: format!("https://shop.example/{}", id),
            video_id: String::new(),
            image_data: None,
        }
    }

    #[test]
    fn test_group_tags_drop_last() {
        let tags = vec!["Jigs".to_string(), "Sleds".to_string(), "vid1".to_string()];
        assert_eq!(group_tags(&tags), vec!["Jigs", "Sleds"]);
        assert!(group_tags(&["only".to_string()]).is_empty());
        assert!(group_tags(&[]).is_empty());
    }

    #[test]
    fn test_group_by_tag() {
        let groups = group_by_tag(vec![
            product("1", &["Jigs", "Sleds", "x"]).into(),
            product("2", &["Jigs", "y"]).into(),
            product("3", &["z"]).into(),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["Jigs"].len(), 2);
        assert_eq!(groups["Sleds"][0].id, "1");
    }

    #[test]
    fn test_shop_product_json() {
        let shop: ShopProduct = product("1", &["Jigs", "x"]).into();
        let json = serde_json::to_value(&shop).unwrap();
        assert_eq!(json["groupTags"], serde_json::json!(["Jigs"]));
        assert_eq!(json["tags"], serde_json::json!(["Jigs", "x"]));
        assert!(json["image_data"].is_null());
        assert!(json.get("video_id").is_none());
    }

    #[tokio::test]
    async fn test_list_products_flat_and_grouped() {
        let store = MemoryStore::new();
        store.insert_product(product("1", &["Sleds", "a"])).unwrap();
        store.insert_product(product("2", &["Clamps", "b"])).unwrap();

        let flat = list_products(&store, "default").await.unwrap();
        let json = serde_json::to_value(&flat).unwrap();
        assert_eq!(json["sortOption"], "default");
        assert_eq!(json["products"][0]["id"], "1");

        let grouped = list_products(&store, "video").await.unwrap();
        let json = serde_json::to_value(&grouped).unwrap();
        assert_eq!(json["sortOption"], "video");
        assert_eq!(json["groupedProducts"]["Clamps"][0]["id"], "2");
        assert!(json.get("products").is_none());

        let unknown = list_products(&store, "price").await.unwrap();
        assert!(matches!(unknown, ShopListing::Flat { .. }));
    }
}

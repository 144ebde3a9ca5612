use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::repository::Document;
use crate::database::store::Collection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
}

impl Document for Category {
    const COLLECTION: Collection = Collection::Categories;
    const LABEL: &'static str = "category";

    fn id(&self) -> Uuid {
        self.id
    }
}

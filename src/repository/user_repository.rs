use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::error::Result;
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use uuid::Uuid;

use crate::models::user::User;

pub struct UserRepository {
    collection: Collection<User>,
}

impl UserRepository {
    pub fn new(client: &Client) -> Self {
        let db = client.database("volleybank");
        let collection = db.collection::<User>("users");
        UserRepository { collection }
    }

    /// One account per email address.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index, None).await.map(|_| ())
    }

    pub async fn create_user(&self, user: &User) -> Result<()> {
        self.collection.insert_one(user, None).await.map(|_| ())
    }

    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let filter = doc! { "id": id.to_string() };
        self.collection.find_one(filter, None).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let filter = doc! { "email": email };
        self.collection.find_one(filter, None).await
    }

    pub async fn get_all_players(&self) -> Result<Vec<User>> {
        let filter = doc! { "role": "player" };
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let mut cursor = self.collection.find(filter, options).await?;
        let mut players = Vec::new();
        while let Some(player) = cursor.try_next().await? {
            players.push(player);
        }
        Ok(players)
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        new_name: Option<String>,
        new_team: Option<String>,
    ) -> Result<()> {
        let filter = doc! { "id": id.to_string() };

        let mut update_fields = doc! {};
        if let Some(name) = new_name {
            update_fields.insert("name", name);
        }
        if let Some(team) = new_team {
            update_fields.insert("team", team);
        }
        if update_fields.is_empty() {
            return Ok(());
        }

        let update = doc! { "$set": update_fields };
        self.collection.update_one(filter, update, None).await.map(|_| ())
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let filter = doc! { "id": id.to_string() };
        let result = self.collection.delete_one(filter, None).await?;
        Ok(result.deleted_count > 0)
    }
}

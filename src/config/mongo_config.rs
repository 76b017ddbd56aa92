use mongodb::{options::ClientOptions, Client};

const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";

pub async fn setup_mongo() -> Client {
    let mongo_uri =
        std::env::var("MONGO_URI").unwrap_or_else(|_| DEFAULT_MONGO_URI.to_string());
    let mut client_options = ClientOptions::parse(&mongo_uri).await.unwrap();
    client_options.app_name = Some("volleybank-api".to_string());
    Client::with_options(client_options).unwrap()
}

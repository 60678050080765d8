//! 卡片激活服务入口

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    card_activation::bootstrap::run("config").await
}

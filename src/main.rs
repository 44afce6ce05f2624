#[actix_web::main]
async fn main() -> std::io::Result<()> {
    daily_damage_report::run().await
}

use visitpay::{
    auth::AuthService,
    domain::{CreateAppointmentRequest, CreateUserRequest, LocationType, MembershipPlan, UserRole},
    pricing::{calculate_price, PricingRates, TravelFee},
    repository::{
        AppointmentRepository, SqliteAppointmentRepository,
        MembershipRepository, SqliteMembershipRepository,
        UserRepository, SqliteUserRepository,
    },
};
use chrono::{Duration, Utc};
use clap::Parser;
use fake::{Fake, faker::internet::en::SafeEmail, faker::name::en::Name};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

#[derive(Parser)]
#[command(about = "Seed a development database with plans, users and appointments")]
struct Args {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:visitpay.db?mode=rwc")]
    database_url: String,

    /// Number of senior accounts to create.
    #[arg(long, default_value_t = 3)]
    seniors: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let user_repo = SqliteUserRepository::new(db_pool.clone());
    let appointment_repo = SqliteAppointmentRepository::new(db_pool.clone());
    let membership_repo = SqliteMembershipRepository::new(db_pool.clone());
    let auth_service = AuthService::new(db_pool.clone());
    let rates = PricingRates::default();

    println!("📦 Creating membership plans...");
    let plans = [
        ("basic", "Basic", 2900, 7500, 0, true, 1),
        ("premium", "Premium", 5900, 6500, 60, true, 2),
        ("family", "Family", 8900, 6000, 60, false, 4),
    ];
    let mut created_plans = Vec::new();
    for (plan_type, name, monthly, hourly, included, remote_only, covered) in plans {
        let plan = membership_repo.create_plan(MembershipPlan {
            id: Uuid::new_v4(),
            plan_type: plan_type.to_string(),
            name: name.to_string(),
            monthly_price_cents: monthly,
            member_hourly_rate_cents: hourly,
            included_visit_minutes: included,
            included_minutes_remote_only: remote_only,
            max_covered_people: covered,
            is_active: true,
        }).await?;
        println!("  ✅ {} plan: {}", plan.name, plan.id);
        created_plans.push(plan);
    }

    println!("👥 Creating users...");
    let admin = user_repo.create(CreateUserRequest {
        email: "admin@visitpay.local".to_string(),
        full_name: "Admin User".to_string(),
        role: UserRole::Admin,
        stripe_customer_id: None,
    }).await?;

    let specialist = user_repo.create(CreateUserRequest {
        email: SafeEmail().fake(),
        full_name: Name().fake(),
        role: UserRole::Specialist,
        stripe_customer_id: None,
    }).await?;
    println!("  ✅ Specialist {} ({})", specialist.full_name, specialist.id);

    let mut seniors = Vec::new();
    for _ in 0..args.seniors {
        let senior = user_repo.create(CreateUserRequest {
            email: SafeEmail().fake(),
            full_name: Name().fake(),
            role: UserRole::Senior,
            stripe_customer_id: None,
        }).await?;
        println!("  ✅ Senior {} ({})", senior.full_name, senior.id);
        seniors.push(senior);
    }

    println!("📅 Creating appointments...");
    for (i, senior) in seniors.iter().enumerate() {
        let (location_type, distance) = if i % 2 == 0 {
            (LocationType::InPerson, 32.0)
        } else {
            (LocationType::Remote, 0.0)
        };
        let duration_minutes = 60 + 30 * (i as i64 % 3);
        let travel = TravelFee::for_distance(distance, &rates);
        let price = calculate_price(duration_minutes, location_type, None, travel.client_fee_cents, &rates);

        let appointment = appointment_repo.create(CreateAppointmentRequest {
            requester_id: senior.id,
            provider_id: specialist.id,
            scheduled_at: Utc::now() + Duration::days(i as i64 + 1),
            duration_minutes,
            location_type,
            base_price_cents: price.service_price_cents,
            travel_fee_cents: price.travel_fee_cents,
            travel_distance_miles: distance,
        }).await?;
        println!(
            "  ✅ Appointment {} for {}: {} min {}, total ${:.2}",
            appointment.id,
            senior.full_name,
            duration_minutes,
            location_type.as_str(),
            price.total_cents as f64 / 100.0
        );
    }

    println!("🔑 Issuing sessions (valid 24h)...");
    let (_, admin_token) = auth_service.create_session(admin.id, 24).await?;
    println!("  admin    {}", admin_token);
    for senior in &seniors {
        let (_, token) = auth_service.create_session(senior.id, 24).await?;
        println!("  {:<8} {}", senior.full_name.split_whitespace().next().unwrap_or("senior"), token);
    }

    println!("✨ Seeding complete!");

    Ok(())
}

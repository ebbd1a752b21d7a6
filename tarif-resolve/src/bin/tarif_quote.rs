use std::sync::Arc;

use chrono::Utc;
use tarif_books::{PriceBook, PriceBookEntry};
use tarif_core::collaborator::{
    AlwaysSellable, AnonymousDirectory, NoTax, StaticCatalog, TracingAuditSink,
};
use tarif_core::UserSegment;
use tarif_geo::{GeoZone, GeoZoneMapping, ZoneLevel};
use tarif_modifier::{ModifierScope, ModifierType, PriceModifier};
use tarif_resolve::{Location, ResolveContext, Resolver};
use tarif_store::MemoryStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Seeds an in-memory store with a small US hierarchy and prints a quote.
#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tarif_resolve=debug,tarif_books=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = tarif_store::Config::load().expect("failed to load config");
    tracing::info!(currency = %config.resolution.default_currency, "starting quote demo");

    let store = Arc::new(MemoryStore::new());

    // zones: US -> NY -> NYC, pincode 10001 in NYC
    let us = GeoZone::new("United States", "US", ZoneLevel::Country, None);
    let ny = GeoZone::new("New York", "NY", ZoneLevel::State, Some(us.id));
    let nyc = GeoZone::new("New York City", "NYC", ZoneLevel::City, Some(ny.id));
    for z in [&us, &ny, &nyc] {
        tarif_geo::ZoneRepository::save_zone(store.as_ref(), z)
            .await
            .unwrap();
    }
    tarif_geo::ZoneRepository::save_mapping(
        store.as_ref(),
        &GeoZoneMapping::new(nyc.id, 10000, 10499),
    )
    .await
    .unwrap();

    let mut retail = UserSegment::new("RETAIL", "Retail");
    retail.is_default = true;
    store.save_segment(&retail).await;

    // master book priced at 100.00
    let product = Uuid::new_v4();
    let master = PriceBook::master("Master", &config.resolution.default_currency);
    tarif_books::BookRepository::save_book(store.as_ref(), &master, 0)
        .await
        .unwrap();
    tarif_books::BookRepository::upsert_entry(
        store.as_ref(),
        &PriceBookEntry::new(master.id, product, 10_000),
        0,
    )
    .await
    .unwrap();

    // GLOBAL 10% off, NY 15% off
    let global = PriceModifier::new("Global 10", ModifierScope::Global, ModifierType::PercentDec, 10.0);
    let mut ny_deal = PriceModifier::new("NY 15", ModifierScope::Zone, ModifierType::PercentDec, 15.0);
    ny_deal.geo_zone = Some(ny.id);
    ny_deal.priority = 2;
    for m in [&global, &ny_deal] {
        tarif_modifier::ModifierRepository::save_modifier(store.as_ref(), m)
            .await
            .unwrap();
    }

    let resolver = Resolver::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(StaticCatalog),
        Arc::new(AlwaysSellable),
        Arc::new(AnonymousDirectory),
        Arc::new(NoTax),
        Arc::new(TracingAuditSink),
    );

    let quote = resolver
        .resolve(&ResolveContext {
            product_id: product,
            quantity: 1,
            location: Location::Pincode(10001),
            segment_id: None,
            user_id: None,
            requested_at: Utc::now(),
        })
        .await
        .expect("resolution failed");

    println!("{}", serde_json::to_string_pretty(&quote).unwrap());
}

// Replays a recorded slate through the async pipeline.

#[cfg(test)]
mod tests {
    use sharp_edge::config::Config;
    use sharp_edge::engine::composite::RecommendationKind;
    use sharp_edge::engine::parlay::{optimize_per_sport, ParlayConstraints};
    use sharp_edge::feed::replay::ReplayFeed;
    use sharp_edge::feed::types::Side;
    use sharp_edge::pipeline::{parlay_pool, EnginePipeline};

    const SLATE: &str = r#"{"quotes":[{"event_id":"nfl-1","sport":"nfl","market":"spread","side":"home","american_odds":-110,"line":-3.0,"timestamp":"2026-10-04T12:00:00Z","commence_time":"2026-10-04T17:00:00Z"},{"event_id":"nfl-1","sport":"nfl","market":"moneyline","side":"home","american_odds":-150,"timestamp":"2026-10-04T12:00:00Z"},{"event_id":"nfl-2","sport":"nfl","market":"moneyline","side":"away","american_odds":120,"timestamp":"2026-10-04T12:00:00Z"}],"estimates":[{"event_id":"nfl-1","market":"moneyline","side":"home","probability":0.66},{"event_id":"nfl-2","market":"moneyline","side":"away","probability":0.50}]}
{"quotes":[{"event_id":"nfl-1","sport":"nfl","market":"spread","side":"home","american_odds":-110,"line":-7.5,"timestamp":"2026-10-04T14:00:00Z","commence_time":"2026-10-04T17:00:00Z"}],"splits":[{"event_id":"nfl-1","market":"spread","side":"home","bet_pct":0.28,"money_pct":0.70}],"contexts":{"nfl-1":{"injuries":{"total_injuries":2,"total_impact":0.5}}}}
{"quotes":[{"event_id":"nfl-1","sport":"nfl","market":"spread","side":"home","american_odds":-110,"line":-7.5,"timestamp":"2026-10-04T14:05:00Z","commence_time":"2026-10-04T17:00:00Z"}]}
"#;

    #[tokio::test]
    async fn test_replay_slate() {
        let mut feed = ReplayFeed::from_reader(SLATE.as_bytes());
        let mut pipeline = EnginePipeline::new(Config::default());
        let reports = pipeline.run(&mut feed).await.unwrap();
        assert_eq!(reports.len(), 3);

        // Opening batch: two priced moneylines, no movement yet.
        assert_eq!(reports[0].analyses.len(), 2);
        assert!(reports[0].movements.is_empty());
        assert_eq!(reports[0].rejected, 0);

        // -3 -> -7.5 is a steam move through 4, 6 and 7.
        let second = &reports[1];
        assert_eq!(second.steam_moves.len(), 1);
        assert_eq!(second.key_moments.len(), 3);
        assert_eq!(second.sharp_signals[0].sharp_side, Some(Side::Home));

        // 20 sharp money + 10 spread move + 0.5 * 10 injuries
        let assessment = &second.assessments[0];
        assert_eq!(assessment.event_id, "nfl-1");
        assert_eq!(assessment.sharp_edge, 35.0);
        assert_eq!(assessment.volatility, 10.0);
        // High-confidence sharp signal (+10) plus a projected close well past
        // -7.5 saturates the value rating.
        assert_eq!(assessment.value_rating, 100.0);
        let recs = second.recommendations();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].kind, RecommendationKind::MoneylineValue { side: None });
        assert_eq!(recs[1].kind, RecommendationKind::SpreadPick { side: Side::Home });
        assert_eq!(recs[1].confidence, 35.0);

        // Identical line five minutes later is a stale repeat.
        assert!(reports[2].movements.is_empty());

        let pool = parlay_pool(reports.iter().flat_map(|r| &r.analyses));
        assert_eq!(pool.len(), 2);
        let parlays = optimize_per_sport(pool, ParlayConstraints::default(), Config::default().parlay, 9)
            .await
            .unwrap();
        let nfl = &parlays["nfl"];
        assert_eq!(nfl.len(), 1);
        assert_eq!(nfl[0].legs.len(), 2);
        assert_eq!(nfl[0].correlation_score, 0.3);
    }

    #[tokio::test]
    async fn test_missing_replay_file_is_an_error() {
        let err = ReplayFeed::open(std::path::Path::new("/nonexistent/slate.jsonl"))
            .await
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("failed to open replay file"));
    }
}

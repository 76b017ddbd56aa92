use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::error::Result;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, ClientSession, Collection, IndexModel};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::earning::Earning;
use crate::models::match_record::{Match, Participation};

/// Storage for matches and everything recorded with them. The write
/// operations here are transactional: a match, its participations and its
/// earnings become visible together or not at all.
pub struct MatchRepository {
    client: Client,
    matches: Collection<Match>,
    participations: Collection<Participation>,
    earnings: Collection<Earning>,
}

impl MatchRepository {
    pub fn new(client: &Client) -> Self {
        let db = client.database("volleybank");
        MatchRepository {
            client: client.clone(),
            matches: db.collection::<Match>("matches"),
            participations: db.collection::<Participation>("match_players"),
            earnings: db.collection::<Earning>("earnings"),
        }
    }

    /// A player appears at most once per match, both in the participation
    /// list and in the payout ledger.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique_match_player = |collection_keys| {
            IndexModel::builder()
                .keys(collection_keys)
                .options(IndexOptions::builder().unique(true).build())
                .build()
        };
        self.participations
            .create_index(
                unique_match_player(doc! { "match_id": 1, "player_id": 1 }),
                None,
            )
            .await?;
        self.earnings
            .create_index(
                unique_match_player(doc! { "match_id": 1, "player_id": 1 }),
                None,
            )
            .await?;
        self.matches
            .create_index(IndexModel::builder().keys(doc! { "id": 1 }).build(), None)
            .await
            .map(|_| ())
    }

    /// Persists a recorded match: the match row, one participation per
    /// player and one earning per winner, in a single transaction. Any
    /// failure rolls the whole write set back.
    pub async fn create_match(
        &self,
        new_match: &Match,
        participations: &[Participation],
        earnings: &[Earning],
    ) -> Result<()> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        if let Err(e) = self
            .insert_match_documents(&mut session, new_match, participations, earnings)
            .await
        {
            let _ = session.abort_transaction().await;
            return Err(e);
        }

        session.commit_transaction().await
    }

    async fn insert_match_documents(
        &self,
        session: &mut ClientSession,
        new_match: &Match,
        participations: &[Participation],
        earnings: &[Earning],
    ) -> Result<()> {
        self.matches
            .insert_one_with_session(new_match, None, session)
            .await?;
        self.participations
            .insert_many_with_session(participations, None, session)
            .await?;
        self.earnings
            .insert_many_with_session(earnings, None, session)
            .await?;
        Ok(())
    }

    /// Administrative correction of winning team and stake. The replacement
    /// earnings are written in the same transaction as the match update so
    /// the payout ledger never disagrees with the stored stake.
    pub async fn apply_correction(
        &self,
        match_id: Uuid,
        winning_team: &str,
        stake_amount: Decimal,
        new_earnings: &[Earning],
    ) -> Result<()> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        if let Err(e) = self
            .correct_match_documents(&mut session, match_id, winning_team, stake_amount, new_earnings)
            .await
        {
            let _ = session.abort_transaction().await;
            return Err(e);
        }

        session.commit_transaction().await
    }

    async fn correct_match_documents(
        &self,
        session: &mut ClientSession,
        match_id: Uuid,
        winning_team: &str,
        stake_amount: Decimal,
        new_earnings: &[Earning],
    ) -> Result<()> {
        let update = doc! {
            "$set": {
                "winning_team": winning_team,
                "stake_amount": stake_amount.to_string(),
            }
        };
        self.matches
            .update_one_with_session(doc! { "id": match_id.to_string() }, update, None, session)
            .await?;
        self.earnings
            .delete_many_with_session(doc! { "match_id": match_id.to_string() }, None, session)
            .await?;
        self.earnings
            .insert_many_with_session(new_earnings, None, session)
            .await?;
        Ok(())
    }

    /// Deletes a match together with its participations and earnings.
    pub async fn delete_match(&self, match_id: Uuid) -> Result<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let filter = doc! { "match_id": match_id.to_string() };
        let deleted = async {
            self.earnings
                .delete_many_with_session(filter.clone(), None, &mut session)
                .await?;
            self.participations
                .delete_many_with_session(filter.clone(), None, &mut session)
                .await?;
            self.matches
                .delete_one_with_session(doc! { "id": match_id.to_string() }, None, &mut session)
                .await
        }
        .await;

        match deleted {
            Ok(result) => {
                session.commit_transaction().await?;
                Ok(result.deleted_count > 0)
            }
            Err(e) => {
                let _ = session.abort_transaction().await;
                Err(e)
            }
        }
    }

    pub async fn find_match_by_id(&self, id: Uuid) -> Result<Option<Match>> {
        self.matches.find_one(doc! { "id": id.to_string() }, None).await
    }

    pub async fn participations_for_match(&self, match_id: Uuid) -> Result<Vec<Participation>> {
        let filter = doc! { "match_id": match_id.to_string() };
        let mut cursor = self.participations.find(filter, None).await?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    pub async fn earnings_for_match(&self, match_id: Uuid) -> Result<Vec<Earning>> {
        let filter = doc! { "match_id": match_id.to_string() };
        let mut cursor = self.earnings.find(filter, None).await?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    pub async fn participations_for_player(&self, player_id: Uuid) -> Result<Vec<Participation>> {
        let filter = doc! { "player_id": player_id.to_string() };
        let mut cursor = self.participations.find(filter, None).await?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    pub async fn earnings_for_player(&self, player_id: Uuid) -> Result<Vec<Earning>> {
        let filter = doc! { "player_id": player_id.to_string() };
        let mut cursor = self.earnings.find(filter, None).await?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Paginated match listing, newest first, with optional winning-team and
    /// date-range filters. Returns the page plus the unfiltered total for
    /// pagination metadata.
    pub async fn find_matches(
        &self,
        team: Option<&str>,
        date_from: Option<&str>,
        date_to: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Match>, u64)> {
        let mut filter = doc! {};
        if let Some(team) = team {
            filter.insert("winning_team", team);
        }
        let mut date_filter = doc! {};
        if let Some(from) = date_from {
            date_filter.insert("$gte", from);
        }
        if let Some(to) = date_to {
            date_filter.insert("$lte", to);
        }
        if !date_filter.is_empty() {
            filter.insert("date", date_filter);
        }

        let total = self.matches.count_documents(filter.clone(), None).await?;

        let skip = (page.max(1) - 1) * limit;
        let options = FindOptions::builder()
            .sort(doc! { "date": -1, "created_at": -1 })
            .skip(skip as u64)
            .limit(limit)
            .build();
        let mut cursor = self.matches.find(filter, options).await?;
        let mut matches = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            matches.push(row);
        }
        Ok((matches, total))
    }

    pub async fn recent_matches(&self, limit: i64) -> Result<Vec<Match>> {
        let options = FindOptions::builder()
            .sort(doc! { "date": -1, "created_at": -1 })
            .limit(limit)
            .build();
        let mut cursor = self.matches.find(None, options).await?;
        let mut matches = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            matches.push(row);
        }
        Ok(matches)
    }

    pub async fn matches_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Match>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let id_strings: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let filter = doc! { "id": { "$in": id_strings } };
        let mut cursor = self.matches.find(filter, None).await?;
        let mut matches = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            matches.push(row);
        }
        Ok(matches)
    }

    /// Admin correction of the raw counters recorded for one player in one
    /// match. Returns the updated participation, or None when the player is
    /// not part of the match.
    pub async fn update_participation_stats(
        &self,
        match_id: Uuid,
        player_id: Uuid,
        smashes: Option<i32>,
        spikes: Option<i32>,
        saves: Option<i32>,
    ) -> Result<Option<Participation>> {
        let filter = doc! {
            "match_id": match_id.to_string(),
            "player_id": player_id.to_string(),
        };

        let mut update_fields = doc! {};
        if let Some(smashes) = smashes {
            update_fields.insert("smashes", smashes);
        }
        if let Some(spikes) = spikes {
            update_fields.insert("spikes", spikes);
        }
        if let Some(saves) = saves {
            update_fields.insert("saves", saves);
        }
        if update_fields.is_empty() {
            return self.participations.find_one(filter, None).await;
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.participations
            .find_one_and_update(filter, doc! { "$set": update_fields }, options)
            .await
    }
}

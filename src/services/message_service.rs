use crate::{
    database::{self, MongoDB},
    middleware::auth::Claims,
    models::{
        Conversation, ConversationSummary, CreateConversationRequest, Message, MAX_MESSAGE_LEN,
        MAX_MESSAGES_PER_CONVERSATION,
    },
    services::{appointment_service, auth_service::{self, now}},
    utils::{AppError, AppResult},
};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, from_document, oid::ObjectId, to_bson, Document};
use uuid::Uuid;

/// Trims a message and enforces the length limits
pub fn validate_message_text(text: &str) -> AppResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::InvalidRequest("Message cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Message exceeds {} characters",
            MAX_MESSAGE_LEN
        )));
    }
    Ok(text.to_string())
}

/// Participant pair in canonical order, so a pair maps to one conversation
pub fn participant_pair(me: &str, other: &str) -> AppResult<Vec<String>> {
    let other = other.trim();
    if other.is_empty() {
        return Err(AppError::InvalidRequest("participant_id is required".to_string()));
    }
    if me == other {
        return Err(AppError::InvalidRequest(
            "Cannot start a conversation with yourself".to_string(),
        ));
    }

    let mut pair = vec![me.to_string(), other.to_string()];
    pair.sort();
    Ok(pair)
}

/// Aggregation producing one inbox row per conversation of `user_id`. Only
/// the last message and the unread count leave the database.
pub fn summary_pipeline(user_id: &str) -> Vec<Document> {
    vec![
        doc! { "$match": { "participants": user_id } },
        doc! { "$sort": { "last_message_at": -1 } },
        doc! { "$project": {
            "_id": 0,
            "id": { "$toString": "$_id" },
            "participants": 1,
            "appointment_id": 1,
            "last_message_at": 1,
            "last_message": { "$arrayElemAt": ["$messages", -1] },
            "unread_count": { "$size": { "$filter": {
                "input": { "$ifNull": ["$messages", []] },
                "as": "m",
                "cond": { "$and": [
                    { "$ne": ["$$m.sender_id", user_id] },
                    { "$eq": ["$$m.read", false] },
                ]},
            }}},
        }},
    ]
}

/// Path that exists once a conversation holds the maximum number of messages
pub fn message_limit_field() -> String {
    format!("messages.{}", MAX_MESSAGES_PER_CONVERSATION - 1)
}

pub async fn list_conversations(db: &MongoDB, claims: &Claims) -> AppResult<Vec<ConversationSummary>> {
    let rows = db
        .collection::<Document>(database::CONVERSATIONS)
        .aggregate(summary_pipeline(&claims.sub))
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        summaries.push(from_document::<ConversationSummary>(row)?);
    }
    Ok(summaries)
}

/// Returns the conversation between the caller and `participant_id`,
/// creating it on first contact.
pub async fn create_conversation(
    db: &MongoDB,
    claims: &Claims,
    request: &CreateConversationRequest,
) -> AppResult<Conversation> {
    let participants = participant_pair(&claims.sub, &request.participant_id)?;
    let pair_key = participants.join("|");

    let other = auth_service::find_user(db, request.participant_id.trim())
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::NotFound("Participant not found".to_string()))?;

    if let Some(appointment_id) = &request.appointment_id {
        let object_id = database::parse_object_id(appointment_id, "appointment")?;
        let appointment = appointment_service::find_appointment(db, object_id).await?;
        if !appointment.is_participant(&claims.sub) || !appointment.is_participant(&other.user_id) {
            return Err(AppError::Forbidden(
                "Both participants must belong to the appointment".to_string(),
            ));
        }
    }

    let collection = db.collection::<Conversation>(database::CONVERSATIONS);

    if let Some(existing) = collection.find_one(doc! { "pair_key": &pair_key }).await? {
        return Ok(existing);
    }

    let timestamp = now();
    let mut conversation = Conversation {
        id: None,
        participants,
        pair_key,
        appointment_id: request.appointment_id.clone(),
        messages: vec![],
        last_message_at: timestamp,
        created_at: timestamp,
    };

    match collection.insert_one(&conversation).await {
        Ok(result) => conversation.id = result.inserted_id.as_object_id(),
        Err(e) if database::is_duplicate_key(&e) => {
            // A concurrent request created the pair first
            return collection
                .find_one(doc! { "pair_key": &conversation.pair_key })
                .await?
                .ok_or_else(|| AppError::Conflict("Conversation is being created, retry".to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    log::info!(
        "💬 Conversation {} created between {:?}",
        conversation.id.map(|id| id.to_hex()).unwrap_or_default(),
        conversation.participants
    );

    Ok(conversation)
}

async fn find_for_participant(
    db: &MongoDB,
    claims: &Claims,
    id: &str,
) -> AppResult<(ObjectId, Conversation)> {
    let object_id = database::parse_object_id(id, "conversation")?;
    let conversation = db
        .collection::<Conversation>(database::CONVERSATIONS)
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

    if !conversation.is_participant(&claims.sub) {
        return Err(AppError::Forbidden(
            "You are not a participant of this conversation".to_string(),
        ));
    }

    Ok((object_id, conversation))
}

pub async fn get_conversation(db: &MongoDB, claims: &Claims, id: &str) -> AppResult<Conversation> {
    find_for_participant(db, claims, id).await.map(|(_, c)| c)
}

pub async fn send_message(
    db: &MongoDB,
    claims: &Claims,
    id: &str,
    text: &str,
) -> AppResult<Message> {
    let text = validate_message_text(text)?;
    let (object_id, _) = find_for_participant(db, claims, id).await?;

    let message = Message {
        message_id: Uuid::new_v4().to_string(),
        sender_id: claims.sub.clone(),
        text,
        timestamp: now(),
        read: false,
    };

    let mut filter = doc! { "_id": object_id, "participants": &claims.sub };
    filter.insert(message_limit_field(), doc! { "$exists": false });

    let result = db
        .collection::<Conversation>(database::CONVERSATIONS)
        .update_one(
            filter,
            doc! {
                "$push": { "messages": to_bson(&message)? },
                "$set": { "last_message_at": message.timestamp },
            },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(AppError::Conflict(format!(
            "Conversation has reached {} messages",
            MAX_MESSAGES_PER_CONVERSATION
        )));
    }

    log::debug!("💬 Message {} sent in conversation {}", message.message_id, id);

    Ok(message)
}

/// Marks every message from the other participant as read
pub async fn mark_read(db: &MongoDB, claims: &Claims, id: &str) -> AppResult<usize> {
    let (object_id, conversation) = find_for_participant(db, claims, id).await?;
    let unread = conversation.unread_for(&claims.sub);
    if unread == 0 {
        return Ok(0);
    }

    db.collection::<Conversation>(database::CONVERSATIONS)
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": { "messages.$[m].read": true } },
        )
        .array_filters(vec![doc! { "m.sender_id": { "$ne": &claims.sub }, "m.read": false }])
        .await?;

    Ok(unread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::test_db;
    use crate::models::{Role, User};
    use crate::services::auth_service::tests::{claims_for, user_for};

    #[test]
    fn test_validate_message_text() {
        assert_eq!(validate_message_text("  hi doc  ").unwrap(), "hi doc");
        assert!(validate_message_text("   ").is_err());
        assert!(validate_message_text(&"x".repeat(MAX_MESSAGE_LEN)).is_ok());
        assert!(validate_message_text(&"x".repeat(MAX_MESSAGE_LEN + 1)).is_err());
    }

    #[test]
    fn test_participant_pair_is_canonical() {
        assert_eq!(participant_pair("b", "a").unwrap(), participant_pair("a", "b").unwrap());
        assert!(participant_pair("a", "a").is_err());
        assert!(participant_pair("a", "  ").is_err());
        assert_eq!(participant_pair("b", "a").unwrap().join("|"), "a|b");
    }

    #[test]
    fn test_message_limit_field() {
        assert_eq!(
            message_limit_field(),
            format!("messages.{}", MAX_MESSAGES_PER_CONVERSATION - 1)
        );
    }

    #[test]
    fn test_summary_pipeline_leaves_messages_in_database() {
        let pipeline = summary_pipeline("patient-1");
        assert_eq!(
            pipeline[0].get_document("$match").unwrap().get_str("participants").unwrap(),
            "patient-1"
        );

        let project = pipeline[2].get_document("$project").unwrap();
        assert!(project.get("messages").is_none());
        assert!(project.contains_key("last_message"));
        assert!(project.contains_key("unread_count"));
    }

    async fn active_user(db: &MongoDB, role: Role) -> String {
        let user_id = Uuid::new_v4().to_string();
        db.collection::<User>(database::USERS)
            .insert_one(user_for(&user_id, role))
            .await
            .unwrap();
        user_id
    }

    fn contact(participant_id: &str) -> CreateConversationRequest {
        CreateConversationRequest {
            participant_id: participant_id.to_string(),
            appointment_id: None,
        }
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_concurrent_first_contact_shares_conversation() {
        let db = test_db().await;
        let patient_id = active_user(&db, Role::Patient).await;
        let doctor_id = active_user(&db, Role::Doctor).await;
        let patient = claims_for(&patient_id, Role::Patient);
        let doctor = claims_for(&doctor_id, Role::Doctor);

        let to_doctor = contact(&doctor_id);
        let to_patient = contact(&patient_id);
        let (a, b) = tokio::join!(
            create_conversation(&db, &patient, &to_doctor),
            create_conversation(&db, &doctor, &to_patient)
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(a.id.is_some());
        assert_eq!(a.id, b.id);

        let stored = db
            .collection::<Conversation>(database::CONVERSATIONS)
            .count_documents(doc! { "pair_key": &a.pair_key })
            .await
            .unwrap();
        assert_eq!(stored, 1);
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_full_conversation_rejects_new_messages() {
        let db = test_db().await;
        let patient_id = active_user(&db, Role::Patient).await;
        let doctor_id = active_user(&db, Role::Doctor).await;
        let patient = claims_for(&patient_id, Role::Patient);

        let conversation = create_conversation(&db, &patient, &contact(&doctor_id)).await.unwrap();
        let id = conversation.id.unwrap();
        let filler: Vec<Message> = (0..MAX_MESSAGES_PER_CONVERSATION - 1)
            .map(|i| Message {
                message_id: Uuid::new_v4().to_string(),
                sender_id: doctor_id.clone(),
                text: format!("note {}", i),
                timestamp: i as i64,
                read: false,
            })
            .collect();
        db.collection::<Conversation>(database::CONVERSATIONS)
            .update_one(
                doc! { "_id": id },
                doc! { "$push": { "messages": { "$each": to_bson(&filler).unwrap() } } },
            )
            .await
            .unwrap();

        send_message(&db, &patient, &id.to_hex(), "last one").await.unwrap();
        let overflow = send_message(&db, &patient, &id.to_hex(), "one too many").await;
        assert!(matches!(overflow, Err(AppError::Conflict(_))));

        let inbox = list_conversations(&db, &patient).await.unwrap();
        let summary = inbox.iter().find(|s| s.id == id.to_hex()).unwrap();
        assert_eq!(summary.unread_count, MAX_MESSAGES_PER_CONVERSATION - 1);
        assert_eq!(summary.last_message.as_ref().unwrap().text, "last one");
    }
}

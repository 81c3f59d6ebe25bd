//! Diesel table definitions mirroring the embedded migrations.

diesel::table! {
    /// Display-name directory for members known to the identity provider.
    members (id) {
        /// Identifier issued by the identity provider.
        id -> Integer,
        /// Name rendered on leaderboards.
        display_name -> Text,
        /// Registration time.
        created_at -> Timestamp,
    }
}

diesel::table! {
    /// Discussion categories.
    categories (id) {
        /// Row identifier.
        id -> Integer,
        /// Stable client-facing identifier.
        slug -> Text,
        /// Human readable name.
        name -> Text,
        /// Denormalised count of live topics.
        topic_count -> Integer,
        /// Creation time.
        created_at -> Timestamp,
    }
}

diesel::table! {
    /// Top-level discussion posts.
    topics (id) {
        /// Row identifier.
        id -> Integer,
        /// Opaque tenant attribute copied from the caller context.
        organization_id -> Text,
        /// Owning category.
        category_id -> Integer,
        /// Author identifier.
        author_id -> Integer,
        /// Topic title.
        title -> Text,
        /// Topic body.
        body -> Text,
        /// Whether moderators pinned the topic.
        pinned -> Bool,
        /// Soft-delete marker.
        deleted -> Bool,
        /// Reply chosen by the author as the answer.
        best_answer_reply_id -> Nullable<Integer>,
        /// Denormalised count of stored replies.
        reply_count -> Integer,
        /// Denormalised count of likes.
        like_count -> Integer,
        /// Number of recorded views.
        view_count -> Integer,
        /// Creation time.
        created_at -> Timestamp,
        /// Last edit time.
        updated_at -> Timestamp,
    }
}

diesel::table! {
    /// Threaded replies; `parent_reply_id` is null for top-level replies.
    replies (id) {
        /// Row identifier.
        id -> Integer,
        /// Opaque tenant attribute copied from the caller context.
        organization_id -> Text,
        /// Owning topic.
        topic_id -> Integer,
        /// Parent reply within the same topic.
        parent_reply_id -> Nullable<Integer>,
        /// Author identifier.
        author_id -> Integer,
        /// Reply body, or the tombstone marker once soft-deleted.
        body -> Text,
        /// Soft-delete marker.
        deleted -> Bool,
        /// Denormalised count of likes.
        like_count -> Integer,
        /// Creation time.
        created_at -> Timestamp,
        /// Last edit time.
        updated_at -> Timestamp,
    }
}

diesel::table! {
    /// Per-user like and bookmark records.
    engagements (user_id, target_type, target_id, kind) {
        /// Engaging user.
        user_id -> Integer,
        /// `topic` or `reply`.
        target_type -> Text,
        /// Identifier of the topic or reply.
        target_id -> Integer,
        /// `like` or `bookmark`.
        kind -> Text,
        /// Opaque tenant attribute copied from the caller context.
        organization_id -> Text,
        /// Time the record was created.
        created_at -> Timestamp,
    }
}

diesel::joinable!(topics -> categories (category_id));
diesel::joinable!(replies -> topics (topic_id));

diesel::allow_tables_to_appear_in_same_query!(members, categories, topics, replies, engagements);

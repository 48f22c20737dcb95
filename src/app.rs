// SPDX-License-Identifier: MPL-2.0

//! Service assembly and the user-facing data flows.
//!
//! `App` builds every service once and hands out clones. Reads go to the
//! cache; remote calls refresh it or write through it.

use crate::api::{
    BlogClient, ClientError, Comment, Like, LikeTarget, NewPost, Post, SignupRequest, User,
};
use crate::cache::{CacheDb, CacheError, DraftRecord};
use crate::config::FEED_SYNC_WORK;
use crate::repo::{DraftRepository, FollowRepository, LikeRepository, PostRepository};
use crate::state::{AppSettings, CurrentUserStore, PreferenceStore, PrefsError, TokenProvider};
use crate::sync::{
    Enqueued, ExistingWorkPolicy, FeedSyncWorker, NetworkMonitor, SyncScheduler, WorkRequest,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Unique name for user-triggered one-off refreshes
pub const FEED_SYNC_NOW_WORK: &str = "feed-sync-now";

const PROBE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Prefs(#[from] PrefsError),
    #[error("not signed in")]
    NotSignedIn,
    #[error("draft {0} not found")]
    DraftNotFound(i64),
}

pub struct App {
    settings: AppSettings,
    prefs: PreferenceStore,
    current_user: CurrentUserStore,
    client: BlogClient,
    posts: PostRepository,
    followers: FollowRepository,
    following: FollowRepository,
    likes: LikeRepository,
    drafts: DraftRepository,
    scheduler: SyncScheduler,
}

impl App {
    /// Open every store under the configured data directory
    pub fn open(settings: AppSettings) -> Result<Self, AppError> {
        let data_dir = settings.data_dir()?;
        info!(data_dir = %data_dir.display(), "opening local data");
        let db = CacheDb::open(&data_dir.join("cache.db"))?;
        let prefs = PreferenceStore::open(data_dir.join("prefs.json"));
        let current_user = CurrentUserStore::open(data_dir.join("current_user.json"));
        // Assume reachable until the probe says otherwise
        Self::assemble(settings, db, prefs, current_user, NetworkMonitor::new(true))
    }

    /// Everything in memory, talking to `api_url`
    pub fn in_memory(api_url: &str) -> Result<Self, AppError> {
        let settings = AppSettings {
            api_url: api_url.to_string(),
            ..AppSettings::default()
        };
        Self::assemble(
            settings,
            CacheDb::open_in_memory()?,
            PreferenceStore::ephemeral(),
            CurrentUserStore::ephemeral(),
            NetworkMonitor::new(true),
        )
    }

    fn assemble(
        settings: AppSettings,
        db: CacheDb,
        prefs: PreferenceStore,
        current_user: CurrentUserStore,
        network: NetworkMonitor,
    ) -> Result<Self, AppError> {
        let client = BlogClient::new(&settings.api_url, prefs.auth_token())?;
        Ok(Self {
            settings,
            current_user,
            client,
            posts: PostRepository::new(db.clone()),
            followers: FollowRepository::followers(db.clone()),
            following: FollowRepository::following(db.clone()),
            likes: LikeRepository::new(db.clone()),
            drafts: DraftRepository::new(db),
            scheduler: SyncScheduler::new(network),
            prefs,
        })
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn prefs(&self) -> &PreferenceStore {
        &self.prefs
    }

    pub fn auth_token(&self) -> TokenProvider {
        self.prefs.auth_token()
    }

    pub fn current_user(&self) -> &CurrentUserStore {
        &self.current_user
    }

    pub fn client(&self) -> &BlogClient {
        &self.client
    }

    pub fn posts(&self) -> &PostRepository {
        &self.posts
    }

    pub fn followers(&self) -> &FollowRepository {
        &self.followers
    }

    pub fn following(&self) -> &FollowRepository {
        &self.following
    }

    pub fn likes(&self) -> &LikeRepository {
        &self.likes
    }

    pub fn drafts(&self) -> &DraftRepository {
        &self.drafts
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    pub fn is_signed_in(&self) -> bool {
        self.prefs.auth_token().is_set()
    }

    fn me(&self) -> Result<User, AppError> {
        self.current_user.get().ok_or(AppError::NotSignedIn)
    }

    // --- session ---

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        let auth = self.client.login(email, password).await?;
        self.start_session(auth.token, auth.user).await
    }

    pub async fn signup(&self, signup: &SignupRequest) -> Result<User, AppError> {
        let auth = self.client.signup(signup).await?;
        self.start_session(auth.token, auth.user).await
    }

    async fn start_session(&self, token: String, user: User) -> Result<User, AppError> {
        self.prefs.auth_token().set(token).await?;
        self.current_user.set(user.clone()).await?;
        info!(user = %user.username, "signed in");

        let push = self.prefs.push_token().current();
        if !push.is_empty()
            && let Err(e) = self.client.update_push_token(&push).await
        {
            warn!(error = %e, "could not register push token after login");
        }
        Ok(user)
    }

    /// Sign out and drop everything cached for this account. Drafts are kept.
    pub async fn logout(&self) -> Result<(), AppError> {
        if self.is_signed_in()
            && let Err(e) = self.client.logout().await
        {
            warn!(error = %e, "server logout failed, clearing local session anyway");
        }

        self.scheduler.cancel(FEED_SYNC_WORK);
        self.scheduler.cancel(FEED_SYNC_NOW_WORK);

        self.prefs.auth_token().clear().await?;
        self.current_user.clear().await?;
        self.posts.clear().await?;
        self.followers.delete_all().await?;
        self.following.delete_all().await?;
        self.likes.delete_all().await?;
        info!("signed out");
        Ok(())
    }

    // --- posts ---

    /// Pull the feed and upsert it into the cache, recording the user's likes
    pub async fn refresh_feed(&self) -> Result<usize, AppError> {
        let posts = self.client.fetch_posts().await?;
        self.posts.insert(&posts).await?;
        if let Some(me) = self.current_user.get() {
            self.record_likes(&me, &posts).await?;
        }
        debug!(count = posts.len(), "feed refreshed");
        Ok(posts.len())
    }

    /// Match the stored likes to what the listing says about `me`
    async fn record_likes(&self, me: &User, posts: &[Post]) -> Result<(), AppError> {
        let mut liked = Vec::new();
        let mut unliked = Vec::new();
        {
            let mut record = |target_id: &str, target: LikeTarget, is_liked: bool| {
                if is_liked {
                    liked.push(Like {
                        user_id: me.id.clone(),
                        target_id: target_id.to_string(),
                        target,
                    });
                } else {
                    unliked.push(target_id.to_string());
                }
            };
            for post in posts {
                record(&post.id, LikeTarget::Post, post.is_liked_by(&me.id));
                for comment in &post.comments {
                    record(&comment.id, LikeTarget::Comment, comment.is_liked_by(&me.id));
                }
            }
        }
        self.likes.reconcile(&me.id, unliked, liked).await?;
        Ok(())
    }

    /// Fetch one post with its comments, count a view, and refresh its cached row
    pub async fn open_post(&self, post_id: &str) -> Result<Post, AppError> {
        let post = self.client.fetch_post(post_id).await?;
        if let Err(e) = self.client.register_view(post_id).await {
            debug!(error = %e, post_id, "view not registered");
        }
        self.posts.insert(std::slice::from_ref(&post)).await?;
        Ok(post)
    }

    pub async fn publish(&self, post: &NewPost) -> Result<Post, AppError> {
        let created = self.client.upload_post(post).await?;
        self.posts.insert(std::slice::from_ref(&created)).await?;
        Ok(created)
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<(), AppError> {
        self.client.delete_post(post_id).await?;
        self.posts.delete(post_id).await?;
        Ok(())
    }

    /// Server-side search; results are not cached
    pub async fn search(&self, query: &str) -> Result<Vec<Post>, AppError> {
        Ok(self.client.search_posts(query).await?)
    }

    pub async fn comment(&self, post_id: &str, text: &str) -> Result<Comment, AppError> {
        Ok(self.client.add_comment(post_id, text).await?)
    }

    /// Like or unlike a post. Returns whether it is now liked.
    pub async fn toggle_like(&self, post_id: &str) -> Result<bool, AppError> {
        let me = self.me()?;
        if self.likes.contains(&me.id, post_id).await? {
            self.client.unlike_post(post_id).await?;
            self.likes.delete(&me.id, post_id).await?;
            Ok(false)
        } else {
            self.client.like_post(post_id).await?;
            self.likes
                .insert(Like {
                    user_id: me.id,
                    target_id: post_id.to_string(),
                    target: LikeTarget::Post,
                })
                .await?;
            Ok(true)
        }
    }

    pub async fn toggle_comment_like(
        &self,
        post_id: &str,
        comment_id: &str,
    ) -> Result<bool, AppError> {
        let me = self.me()?;
        if self.likes.contains(&me.id, comment_id).await? {
            self.client.unlike_comment(post_id, comment_id).await?;
            self.likes.delete(&me.id, comment_id).await?;
            Ok(false)
        } else {
            self.client.like_comment(post_id, comment_id).await?;
            self.likes
                .insert(Like {
                    user_id: me.id,
                    target_id: comment_id.to_string(),
                    target: LikeTarget::Comment,
                })
                .await?;
            Ok(true)
        }
    }

    // --- follows ---

    /// Overwrite both follow replicas from the server
    pub async fn refresh_follow_state(&self) -> Result<(usize, usize), AppError> {
        let me = self.me()?;
        let followers = self.client.fetch_followers(&me.id).await?;
        let following = self.client.fetch_following(&me.id).await?;
        self.followers.replace_all(&followers).await?;
        self.following.replace_all(&following).await?;
        Ok((followers.len(), following.len()))
    }

    pub async fn follow(&self, user: &User) -> Result<(), AppError> {
        self.client.follow(&user.id).await?;
        self.following.insert_one(user).await?;
        Ok(())
    }

    pub async fn unfollow(&self, user_id: &str) -> Result<(), AppError> {
        self.client.unfollow(user_id).await?;
        self.following.delete_one(user_id).await?;
        Ok(())
    }

    pub async fn fetch_user(&self, user_id: &str) -> Result<User, AppError> {
        Ok(self.client.fetch_user(user_id).await?)
    }

    // --- drafts ---

    pub async fn save_draft(&self, draft: NewPost) -> Result<i64, AppError> {
        Ok(self.drafts.save(draft).await?)
    }

    pub async fn update_draft(&self, id: i64, draft: NewPost) -> Result<(), AppError> {
        Ok(self.drafts.update(id, draft).await?)
    }

    /// Upload a draft, then remove it. A failed upload leaves the draft in place.
    pub async fn publish_draft(&self, id: i64) -> Result<Post, AppError> {
        let draft: DraftRecord = self
            .drafts
            .find(id)
            .await?
            .ok_or(AppError::DraftNotFound(id))?;
        let post = self.publish(&NewPost::from(&draft)).await?;
        self.drafts.delete(id).await?;
        Ok(post)
    }

    pub async fn discard_draft(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.drafts.delete(id).await?)
    }

    // --- push ---

    /// Store a new push token and, when signed in, hand it to the server
    pub async fn register_push_token(&self, token: &str) -> Result<(), AppError> {
        self.prefs.push_token().set(token).await?;
        if self.is_signed_in() {
            self.client.update_push_token(token).await?;
        }
        Ok(())
    }

    // --- background sync ---

    fn feed_worker(&self) -> Arc<FeedSyncWorker> {
        Arc::new(FeedSyncWorker::new(self.client.clone(), self.posts.clone()))
    }

    /// Start the periodic feed refresh, unless it is already scheduled
    pub fn schedule_feed_sync(&self) -> Enqueued {
        let request = WorkRequest::periodic(self.settings.sync_interval()).require_network();
        self.scheduler.enqueue_unique(
            FEED_SYNC_WORK,
            ExistingWorkPolicy::Keep,
            request,
            self.feed_worker(),
        )
    }

    /// One refresh as soon as the network allows; coalesces repeated requests
    pub fn request_feed_sync(&self) -> Enqueued {
        self.scheduler.enqueue_unique(
            FEED_SYNC_NOW_WORK,
            ExistingWorkPolicy::Keep,
            WorkRequest::one_time().require_network(),
            self.feed_worker(),
        )
    }

    /// Keep the network monitor up to date by probing the API host
    pub fn start_connectivity_probe(&self) -> Option<JoinHandle<()>> {
        let base = self.client.base_url();
        let host = base.host_str()?.to_string();
        let port = base.port_or_known_default()?;
        Some(
            self.scheduler
                .network()
                .spawn_probe(host, port, PROBE_INTERVAL),
        )
    }

    /// Stop all background work
    pub fn shutdown(&self) {
        self.scheduler.cancel_all();
        info!("background work stopped");
    }
}

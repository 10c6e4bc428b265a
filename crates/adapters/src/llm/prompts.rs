//! Prompt builders shared by the HTTP backends

use postpilot_domain::policy::{DEFAULT_MAX_CHARS, MAX_THREAD_SEGMENTS, MIN_THREAD_SEGMENTS};
use postpilot_domain::{CompetitorPost, GenerationRequest, PostAnalysis};

const ANALYSIS_SCHEMA: &str = r##"{
  "tone": ["tone 1", "tone 2"],
  "topics": ["topic 1", "topic 2"],
  "hashtags": ["#tag1", "#tag2"],
  "avgLength": 120,
  "structure": "description of the structure",
  "keyPatterns": ["pattern 1", "pattern 2"]"##;

/// Prompt for a style analysis of an account's own posts
pub fn analyze_posts(posts: &[String]) -> String {
    let mut prompt = String::new();

    prompt.push_str("Analyse the following Threads posts and extract:\n");
    prompt.push_str("1. Tone (formal, casual, humorous, ...)\n");
    prompt.push_str("2. Frequently covered topics\n");
    prompt.push_str("3. Hashtag usage patterns\n");
    prompt.push_str("4. Average post length in characters\n");
    prompt.push_str("5. Post structure (question, list, story, ...)\n");
    prompt.push_str("6. Other characteristic patterns\n\n");

    prompt.push_str("## Posts\n");
    for (i, post) in posts.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, post));
    }

    prompt.push_str("\n## Output Format\nRespond with ONLY a JSON object of this shape:\n");
    prompt.push_str(ANALYSIS_SCHEMA);
    prompt.push_str("\n}\n");

    prompt
}

/// Prompt for a competitor analysis that also extracts viral elements
pub fn analyze_competitor_posts(posts: &[CompetitorPost]) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "The following are popular posts from competitor accounts. Analyse them and extract what makes them spread.\n\n",
    );

    prompt.push_str("## Posts\n");
    for (i, post) in posts.iter().enumerate() {
        prompt.push_str(&format!("{}. Post: {}\n", i + 1, post.text));
        prompt.push_str(&format!("   Likes: {}\n", post.like_count));
        prompt.push_str(&format!("   Replies: {}\n", post.reply_count));
        prompt.push_str(&format!("   Reposts: {}\n", post.repost_count));
    }

    prompt.push_str("\nAnalyse:\n");
    prompt.push_str("1. Tone (approachable, authoritative, humorous, ...)\n");
    prompt.push_str("2. Frequently covered topics\n");
    prompt.push_str("3. Hashtag usage patterns\n");
    prompt.push_str("4. Average post length in characters\n");
    prompt.push_str("5. Post structure (storytelling, list, question, ...)\n");
    prompt.push_str("6. Patterns shared by the most engaging posts\n");
    prompt.push_str("7. Elements that drive engagement\n\n");

    prompt.push_str("## Output Format\nRespond with ONLY a JSON object of this shape:\n");
    prompt.push_str(ANALYSIS_SCHEMA);
    prompt.push_str(",\n  \"viralElements\": [\"element 1\", \"element 2\", \"element 3\"]\n}\n");

    prompt
}

/// Prompt for a post in the analysed style
pub fn generate_post(request: &GenerationRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str("Write a Threads post based on the following analysis.\n\n");
    push_analysis(&mut prompt, &request.analysis);

    match &request.topic {
        Some(topic) => prompt.push_str(&format!("\nTopic: {}\n", topic)),
        None => prompt.push_str("\nPick a fitting topic based on the analysis.\n"),
    }
    push_shape(&mut prompt, request.is_thread);

    prompt.push_str("\nGuidelines:\n");
    prompt.push_str("- Make the post natural and engaging\n");
    prompt.push_str("- Reproduce the analysed style faithfully\n");
    prompt.push_str("- Include fitting hashtags\n");
    prompt.push_str("- Include elements that invite engagement\n");
    push_custom(&mut prompt, request.custom_instructions.as_deref());

    prompt
}

/// Prompt for a post weighted toward the analysis' viral elements
pub fn generate_viral_post(request: &GenerationRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "Write a Threads post with a high chance of going viral, based on this competitor analysis.\n\n",
    );
    push_analysis(&mut prompt, &request.analysis);

    prompt.push_str("\n## Viral elements\n");
    for (i, element) in request.analysis.viral_elements.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, element));
    }

    match &request.topic {
        Some(topic) => prompt.push_str(&format!("\nTopic: {}\n", topic)),
        None => prompt.push_str("\nPick an appealing topic likely to trend, based on the analysis.\n"),
    }
    push_shape(&mut prompt, request.is_thread);

    prompt.push_str("\nGuidelines:\n");
    prompt.push_str("- Make the most of the viral elements\n");
    prompt.push_str("- Use emotionally resonant wording\n");
    prompt.push_str("- Offer concrete, useful information\n");
    prompt.push_str("- Write something readers want to relate to and share\n");
    prompt.push_str("- Place hashtags strategically\n");
    prompt.push_str("- End with a call to action (reply, repost)\n");
    prompt.push_str("- Open with a strong first line\n");
    push_custom(&mut prompt, request.custom_instructions.as_deref());

    prompt
}

fn push_analysis(prompt: &mut String, analysis: &PostAnalysis) {
    prompt.push_str("## Analysis\n");
    prompt.push_str(&format!("Tone: {}\n", analysis.tone.join(", ")));
    prompt.push_str(&format!("Topics: {}\n", analysis.topics.join(", ")));
    prompt.push_str(&format!("Hashtags: {}\n", analysis.hashtags.join(", ")));
    prompt.push_str(&format!(
        "Average length: about {} characters\n",
        analysis.avg_length.round()
    ));
    prompt.push_str(&format!("Structure: {}\n", analysis.structure));
    prompt.push_str(&format!(
        "Key patterns: {}\n",
        analysis.key_patterns.join(", ")
    ));
}

fn push_shape(prompt: &mut String, is_thread: bool) {
    if is_thread {
        prompt.push_str(&format!(
            "Write a thread of {} to {} posts. Each post should read on its own while the whole tells one story.\n",
            MIN_THREAD_SEGMENTS, MAX_THREAD_SEGMENTS
        ));
        prompt.push_str("\n## Output Format\nRespond with ONLY a JSON object of this shape:\n");
        prompt.push_str(
            r#"{
  "content": "first post",
  "threadPosts": ["second post", "third post", "..."]
}
"#,
        );
    } else {
        prompt.push_str("Write a single post.\n");
        prompt.push_str("\n## Output Format\nRespond with ONLY a JSON object of this shape:\n");
        prompt.push_str(
            r#"{
  "content": "the post"
}
"#,
        );
    }
    prompt.push_str(&format!(
        "Each post must be at most {} characters.\n",
        DEFAULT_MAX_CHARS
    ));
}

fn push_custom(prompt: &mut String, custom: Option<&str>) {
    if let Some(custom) = custom.filter(|c| !c.trim().is_empty()) {
        prompt.push_str("\n## Additional instructions\n");
        prompt.push_str(custom);
        prompt.push('\n');
    }
}

//! Process-wide shared state for every player.
//!
//! The shading program that unpacks packed UVs/colours and evaluates the clip
//! side channel is identical for all players. It is built once by
//! [`Runtime::startup`] and handed to players as an `Arc`; hosts compile it
//! once and bind it to each player's material.

use std::sync::Arc;

use crate::config::Config;

/// Uniform names the shading program expects.
pub mod uniforms {
    /// Atlas texture array.
    pub const ATLAS: &str = "ATLAS";
    /// Clip side-channel texture (RGBA float, nearest filtering).
    pub const CLIP_TEXTURE: &str = "CLIP_TEXTURE";
    /// Atlas size in pixels.
    pub const ATLAS_SIZE: &str = "ATLAS_SIZE";
    /// Player-local to view transform; the same camera the clip texture was encoded with.
    pub const VIEW: &str = "u_view";
}

#[derive(Debug)]
pub struct Runtime {
    clip_texture_size: usize,
    clip_texels_per_entry: usize,
    max_clips_per_group: usize,
    vertex_source: String,
    fragment_source: String,
}

impl Runtime {
    /// Build the shared state. Call once at subsystem startup.
    pub fn startup(cfg: &Config) -> Arc<Runtime> {
        let size = cfg.clip_texture_size.max(1);
        let stride = cfg.clip_texels_per_entry.clamp(3, size.max(3));
        let max_clips = cfg.max_clips_per_group.max(1);
        log::debug!("flashplay runtime: clip texture {size}x{size}, stride {stride}, {max_clips} clips/group");
        Arc::new(Runtime {
            clip_texture_size: size,
            clip_texels_per_entry: stride,
            max_clips_per_group: max_clips,
            vertex_source: vertex_source(size, stride, max_clips),
            fragment_source: fragment_source(max_clips),
        })
    }

    pub fn clip_texture_size(&self) -> usize {
        self.clip_texture_size
    }

    pub fn clip_texels_per_entry(&self) -> usize {
        self.clip_texels_per_entry
    }

    pub fn max_clips_per_group(&self) -> usize {
        self.max_clips_per_group
    }

    /// GLSL vertex stage.
    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    /// GLSL fragment stage.
    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn uniform_names(&self) -> [&'static str; 4] {
        [
            uniforms::ATLAS,
            uniforms::CLIP_TEXTURE,
            uniforms::ATLAS_SIZE,
            uniforms::VIEW,
        ]
    }
}

fn vertex_source(size: usize, stride: usize, max_clips: usize) -> String {
    let per_row = (size / stride).max(1);
    format!(
        r#"#version 330 core
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec4 a_color;
layout(location = 2) in vec2 a_uv;

uniform mat3 {view};
uniform sampler2D {clip};

out vec2 v_uv;
out vec4 v_color;
flat out float v_tex;
flat out int v_clip_count;
out vec4 v_clip_uv[{max_clips}];
flat out float v_clip_tex[{max_clips}];
flat out vec4 v_clip_region[{max_clips}];

void main() {{
    float group_id;
    float packed;
    v_uv.x = 2.0 * modf(a_uv.x, group_id);
    v_uv.y = 2.0 * modf(a_uv.y, packed);
    int size_with_tex = int(packed);
    v_tex = float(size_with_tex & 255);
    v_clip_count = min(size_with_tex >> 8, {max_clips});
    // Clip entries are inverses of view-space item transforms.
    vec2 view_pos = ({view} * vec3(a_position, 1.0)).xy;
    for (int i = 0; i < v_clip_count; i++) {{
        int entry = int(group_id) + i;
        ivec2 base = ivec2((entry % {per_row}) * {stride}, entry / {per_row});
        vec4 xy = texelFetch({clip}, base, 0);
        vec4 origin = texelFetch({clip}, base + ivec2(1, 0), 0);
        vec4 region = texelFetch({clip}, base + ivec2(2, 0), 0);
        vec2 local = mat2(xy.xy, xy.zw) * view_pos + origin.xy;
        v_clip_uv[i] = vec4(local / region.zw, local + region.xy);
        v_clip_tex[i] = origin.z;
        v_clip_region[i] = region;
    }}
    v_color = a_color;
    gl_Position = vec4(view_pos, 0.0, 1.0);
}}
"#,
        clip = uniforms::CLIP_TEXTURE,
        view = uniforms::VIEW,
    )
}

fn fragment_source(max_clips: usize) -> String {
    format!(
        r#"#version 330 core
uniform sampler2DArray {atlas};
uniform vec2 {atlas_size};

in vec2 v_uv;
in vec4 v_color;
flat in float v_tex;
flat in int v_clip_count;
in vec4 v_clip_uv[{max_clips}];
flat in float v_clip_tex[{max_clips}];
flat in vec4 v_clip_region[{max_clips}];

out vec4 frag;

void main() {{
    float masked = v_clip_count > 0 ? 0.0 : 1.0;
    for (int i = 0; i < v_clip_count; i++) {{
        vec2 cuv = v_clip_uv[i].xy;
        if (all(greaterThanEqual(cuv, vec2(0.0))) && all(lessThan(cuv, vec2(1.0)))) {{
            float a = textureLod({atlas}, vec3(v_clip_uv[i].zw / {atlas_size}, v_clip_tex[i]), 0.0).a;
            masked = max(masked, a);
            if (masked >= 1.0) break;
        }}
    }}
    if (masked <= 0.0) discard;
    vec4 add;
    vec4 mult = 2.0 * modf(v_color, add);
    vec4 c = texture({atlas}, vec3(v_uv, v_tex));
    frag = c * mult + add / 255.0;
    frag.a = c.a <= 0.0 ? 0.0 : min(frag.a, masked);
}}
"#,
        atlas = uniforms::ATLAS,
        atlas_size = uniforms::ATLAS_SIZE,
    )
}

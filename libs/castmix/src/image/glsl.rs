// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! GLSL sources for the image kernel.
//!
//! One program draws everything: every pixel format, keyer and blend
//! mode. Colors travel through the shader in the channel-reversed
//! register convention the readback path expects; the final `.bgra`
//! swizzle restores byte order.

/// The quad is synthesized from `gl_VertexID` as a 4-vertex triangle
/// strip; texcoord 0 is the source UV, texcoord 1 the fill-mapped
/// target UV.
pub const VERTEX: &str = r#"
#version 330 core

uniform vec2 fill_translation;
uniform vec2 fill_scale;

out vec2 tex_coord0;
out vec2 tex_coord1;

void main()
{
    vec2 corner = vec2(float(gl_VertexID & 1), float(gl_VertexID >> 1));
    tex_coord0  = corner;
    tex_coord1  = fill_translation + corner * fill_scale;
    gl_Position = vec4(tex_coord1 * 2.0 - 1.0, 0.0, 1.0);
}
"#;

const UNIFORMS: &str = r#"
uniform sampler2D background;
uniform sampler2D plane[4];
uniform sampler2D local_key;
uniform sampler2D layer_key;

uniform bool  is_hd;
uniform bool  has_local_key;
uniform bool  has_layer_key;
uniform int   blend_mode;
uniform int   keyer;
uniform int   pixel_format;
uniform int   field_mask;

uniform float opacity;
uniform bool  levels;
uniform float min_input;
uniform float max_input;
uniform float gamma;
uniform float min_output;
uniform float max_output;

uniform bool  csb;
uniform float brt;
uniform float sat;
uniform float con;

in vec2 tex_coord0;
in vec2 tex_coord1;

out vec4 frag_color;
"#;

const ADJUSTMENT: &str = r#"
vec3 ContrastSaturationBrightness(vec3 color, float brt, float sat, float con)
{
    const vec3 LumCoeff = vec3(0.2125, 0.7154, 0.0721);

    vec3 AvgLumin  = vec3(0.5);
    vec3 brtColor  = color * brt;
    vec3 intensity = vec3(dot(brtColor, LumCoeff));
    vec3 satColor  = mix(intensity, brtColor, sat);
    vec3 conColor  = mix(AvgLumin, satColor, con);
    return conColor;
}

vec3 GammaCorrection(vec3 color, float gamma)
{
    return pow(color, vec3(1.0 / gamma));
}

vec3 LevelsControlInputRange(vec3 color, float minInput, float maxInput)
{
    return min(max(color - vec3(minInput), vec3(0.0)) / (vec3(maxInput) - vec3(minInput)), vec3(1.0));
}

vec3 LevelsControl(vec3 color, float minInput, float maxInput, float gamma, float minOutput, float maxOutput)
{
    vec3 adjusted = GammaCorrection(LevelsControlInputRange(color, minInput, maxInput), gamma);
    return mix(vec3(minOutput), vec3(maxOutput), adjusted);
}
"#;

const BLENDING: &str = r#"
#define BlendAddf(base, blend)          min(base + blend, 1.0)
#define BlendSubstractf(base, blend)    max(base + blend - 1.0, 0.0)
#define BlendLinearDodgef               BlendAddf
#define BlendLinearBurnf                BlendSubstractf
#define BlendLightenf(base, blend)      max(blend, base)
#define BlendDarkenf(base, blend)       min(blend, base)
#define BlendLinearLightf(base, blend)  (blend < 0.5 ? BlendLinearBurnf(base, (2.0 * blend)) : BlendLinearDodgef(base, (2.0 * (blend - 0.5))))
#define BlendScreenf(base, blend)       (1.0 - ((1.0 - base) * (1.0 - blend)))
#define BlendOverlayf(base, blend)      (base < 0.5 ? (2.0 * base * blend) : (1.0 - 2.0 * (1.0 - base) * (1.0 - blend)))
#define BlendColorDodgef(base, blend)   ((blend == 1.0) ? blend : min(base / (1.0 - blend), 1.0))
#define BlendColorBurnf(base, blend)    ((blend == 0.0) ? blend : max((1.0 - ((1.0 - base) / blend)), 0.0))
#define BlendVividLightf(base, blend)   ((blend < 0.5) ? BlendColorBurnf(base, (2.0 * blend)) : BlendColorDodgef(base, (2.0 * (blend - 0.5))))
#define BlendPinLightf(base, blend)     ((blend < 0.5) ? BlendDarkenf(base, (2.0 * blend)) : BlendLightenf(base, (2.0 * (blend - 0.5))))
#define BlendHardMixf(base, blend)      ((BlendVividLightf(base, blend) < 0.5) ? 0.0 : 1.0)
#define BlendReflectf(base, blend)      ((blend == 1.0) ? blend : min(base * base / (1.0 - blend), 1.0))

#define Blend(base, blend, funcf)       vec3(funcf(base.r, blend.r), funcf(base.g, blend.g), funcf(base.b, blend.b))

#define BlendNormal(base, blend)        (blend)
#define BlendLighten(base, blend)       Blend(base, blend, BlendLightenf)
#define BlendDarken(base, blend)        Blend(base, blend, BlendDarkenf)
#define BlendMultiply(base, blend)      (base * blend)
#define BlendAverage(base, blend)       ((base + blend) / 2.0)
#define BlendAdd(base, blend)           min(base + blend, vec3(1.0))
#define BlendSubstract(base, blend)     max(base + blend - vec3(1.0), vec3(0.0))
#define BlendDifference(base, blend)    abs(base - blend)
#define BlendNegation(base, blend)      (vec3(1.0) - abs(vec3(1.0) - base - blend))
#define BlendExclusion(base, blend)     (base + blend - 2.0 * base * blend)
#define BlendScreen(base, blend)        Blend(base, blend, BlendScreenf)
#define BlendOverlay(base, blend)       Blend(base, blend, BlendOverlayf)
#define BlendHardLight(base, blend)     BlendOverlay(blend, base)
#define BlendColorDodge(base, blend)    Blend(base, blend, BlendColorDodgef)
#define BlendColorBurn(base, blend)     Blend(base, blend, BlendColorBurnf)
#define BlendLinearDodge(base, blend)   Blend(base, blend, BlendLinearDodgef)
#define BlendLinearBurn(base, blend)    Blend(base, blend, BlendLinearBurnf)
#define BlendLinearLight(base, blend)   Blend(base, blend, BlendLinearLightf)
#define BlendVividLight(base, blend)    Blend(base, blend, BlendVividLightf)
#define BlendPinLight(base, blend)      Blend(base, blend, BlendPinLightf)
#define BlendHardMix(base, blend)       Blend(base, blend, BlendHardMixf)
#define BlendReflect(base, blend)       Blend(base, blend, BlendReflectf)
#define BlendGlow(base, blend)          BlendReflect(blend, base)
#define BlendPhoenix(base, blend)       (min(base, blend) - max(base, blend) + vec3(1.0))

float HueToRGB(float f1, float f2, float hue)
{
    if (hue < 0.0)
        hue += 1.0;
    else if (hue > 1.0)
        hue -= 1.0;

    float res;
    if ((6.0 * hue) < 1.0)
        res = f1 + (f2 - f1) * 6.0 * hue;
    else if ((2.0 * hue) < 1.0)
        res = f2;
    else if ((3.0 * hue) < 2.0)
        res = f1 + (f2 - f1) * ((2.0 / 3.0) - hue) * 6.0;
    else
        res = f1;
    return res;
}

vec3 RGBToHSL(vec3 color)
{
    float fmin = min(min(color.r, color.g), color.b);
    float fmax = max(max(color.r, color.g), color.b);
    float delta = fmax - fmin;

    vec3 hsl;
    hsl.z = (fmax + fmin) / 2.0;

    if (delta == 0.0)
    {
        hsl.x = 0.0;
        hsl.y = 0.0;
    }
    else
    {
        if (hsl.z < 0.5)
            hsl.y = delta / (fmax + fmin);
        else
            hsl.y = delta / (2.0 - fmax - fmin);

        float dr = (((fmax - color.r) / 6.0) + (delta / 2.0)) / delta;
        float dg = (((fmax - color.g) / 6.0) + (delta / 2.0)) / delta;
        float db = (((fmax - color.b) / 6.0) + (delta / 2.0)) / delta;

        if (color.r == fmax)
            hsl.x = db - dg;
        else if (color.g == fmax)
            hsl.x = (1.0 / 3.0) + dr - db;
        else
            hsl.x = (2.0 / 3.0) + dg - dr;

        if (hsl.x < 0.0)
            hsl.x += 1.0;
        else if (hsl.x > 1.0)
            hsl.x -= 1.0;
    }
    return hsl;
}

vec3 HSLToRGB(vec3 hsl)
{
    if (hsl.y == 0.0)
        return vec3(hsl.z);

    float f2;
    if (hsl.z < 0.5)
        f2 = hsl.z * (1.0 + hsl.y);
    else
        f2 = (hsl.z + hsl.y) - (hsl.y * hsl.z);
    float f1 = 2.0 * hsl.z - f2;

    return vec3(
        HueToRGB(f1, f2, hsl.x + (1.0 / 3.0)),
        HueToRGB(f1, f2, hsl.x),
        HueToRGB(f1, f2, hsl.x - (1.0 / 3.0)));
}

vec3 BlendHue(vec3 base, vec3 blend)
{
    vec3 baseHSL = RGBToHSL(base);
    return HSLToRGB(vec3(RGBToHSL(blend).r, baseHSL.g, baseHSL.b));
}

vec3 BlendSaturation(vec3 base, vec3 blend)
{
    vec3 baseHSL = RGBToHSL(base);
    return HSLToRGB(vec3(baseHSL.r, RGBToHSL(blend).g, baseHSL.b));
}

vec3 BlendColor(vec3 base, vec3 blend)
{
    vec3 blendHSL = RGBToHSL(blend);
    return HSLToRGB(vec3(blendHSL.r, blendHSL.g, RGBToHSL(base).b));
}

vec3 BlendLuminosity(vec3 base, vec3 blend)
{
    vec3 baseHSL = RGBToHSL(base);
    return HSLToRGB(vec3(baseHSL.r, baseHSL.g, RGBToHSL(blend).b));
}
"#;

const BLEND_COMPOSITE: &str = r#"
vec3 get_blend_color(vec3 back, vec3 fore)
{
    switch (blend_mode)
    {
    case  0: return BlendNormal(back, fore);
    case  1: return BlendLighten(back, fore);
    case  2: return BlendDarken(back, fore);
    case  3: return BlendMultiply(back, fore);
    case  4: return BlendAverage(back, fore);
    case  5: return BlendAdd(back, fore);
    case  6: return BlendSubstract(back, fore);
    case  7: return BlendDifference(back, fore);
    case  8: return BlendNegation(back, fore);
    case  9: return BlendExclusion(back, fore);
    case 10: return BlendScreen(back, fore);
    case 11: return BlendOverlay(back, fore);
    case 13: return BlendHardLight(back, fore);
    case 14: return BlendColorDodge(back, fore);
    case 15: return BlendColorBurn(back, fore);
    case 16: return BlendLinearDodge(back, fore);
    case 17: return BlendLinearBurn(back, fore);
    case 18: return BlendLinearLight(back, fore);
    case 19: return BlendVividLight(back, fore);
    case 20: return BlendPinLight(back, fore);
    case 21: return BlendHardMix(back, fore);
    case 22: return BlendReflect(back, fore);
    case 23: return BlendGlow(back, fore);
    case 24: return BlendPhoenix(back, fore);
    case 25: return BlendHue(back, fore);
    case 26: return BlendSaturation(back, fore);
    case 27: return BlendColor(back, fore);
    case 28: return BlendLuminosity(back, fore);
    }
    return BlendNormal(back, fore);
}

vec4 blend(vec4 fore)
{
    vec4 back = texture(background, tex_coord1).bgra;
    if (blend_mode != 0)
        fore.rgb = get_blend_color(back.rgb / (back.a + 0.0000001), fore.rgb / (fore.a + 0.0000001)) * fore.a;
    switch (keyer)
    {
        case 1:  return fore + back;
        default: return fore + (1.0 - fore.a) * back;
    }
}
"#;

/// Without blend modes compiled in, compositing happens in fixed-
/// function blending; the shader just passes the foreground through.
const SIMPLE_COMPOSITE: &str = r#"
vec4 blend(vec4 fore)
{
    return fore;
}
"#;

const SAMPLING_AND_MAIN: &str = r#"
vec4 ycbcra_to_rgba_sd(float Y, float Cb, float Cr, float A)
{
    vec4 rgba;
    rgba.b = (1.164 * (Y * 255.0 - 16.0) + 1.596 * (Cr * 255.0 - 128.0)) / 255.0;
    rgba.g = (1.164 * (Y * 255.0 - 16.0) - 0.813 * (Cr * 255.0 - 128.0) - 0.391 * (Cb * 255.0 - 128.0)) / 255.0;
    rgba.r = (1.164 * (Y * 255.0 - 16.0) + 2.018 * (Cb * 255.0 - 128.0)) / 255.0;
    rgba.a = A;
    return rgba;
}

vec4 ycbcra_to_rgba_hd(float Y, float Cb, float Cr, float A)
{
    vec4 rgba;
    rgba.b = (1.164 * (Y * 255.0 - 16.0) + 1.793 * (Cr * 255.0 - 128.0)) / 255.0;
    rgba.g = (1.164 * (Y * 255.0 - 16.0) - 0.534 * (Cr * 255.0 - 128.0) - 0.213 * (Cb * 255.0 - 128.0)) / 255.0;
    rgba.r = (1.164 * (Y * 255.0 - 16.0) + 2.115 * (Cb * 255.0 - 128.0)) / 255.0;
    rgba.a = A;
    return rgba;
}

vec4 ycbcra_to_rgba(float y, float cb, float cr, float a)
{
    if (is_hd)
        return ycbcra_to_rgba_hd(y, cb, cr, a);
    else
        return ycbcra_to_rgba_sd(y, cb, cr, a);
}

vec4 get_rgba_color()
{
    switch (pixel_format)
    {
    case 0: // gray
        return vec4(texture(plane[0], tex_coord0).rrr, 1.0);
    case 1: // bgra
        return texture(plane[0], tex_coord0).bgra;
    case 2: // rgba
        return texture(plane[0], tex_coord0).rgba;
    case 3: // argb
        return texture(plane[0], tex_coord0).argb;
    case 4: // abgr
        return texture(plane[0], tex_coord0).gbar;
    case 5: // ycbcr
        {
            float y  = texture(plane[0], tex_coord0).r;
            float cb = texture(plane[1], tex_coord0).r;
            float cr = texture(plane[2], tex_coord0).r;
            return ycbcra_to_rgba(y, cb, cr, 1.0);
        }
    case 6: // ycbcra
        {
            float y  = texture(plane[0], tex_coord0).r;
            float cb = texture(plane[1], tex_coord0).r;
            float cr = texture(plane[2], tex_coord0).r;
            float a  = texture(plane[3], tex_coord0).r;
            return ycbcra_to_rgba(y, cb, cr, a);
        }
    case 7: // luma
        {
            vec3 y3 = texture(plane[0], tex_coord0).rrr;
            return vec4((y3 - 0.065) / 0.859, 1.0);
        }
    }
    return vec4(0.0, 0.0, 0.0, 0.0);
}

void main()
{
    // Fielded draws keep only their scanline parity.
    int row = int(gl_FragCoord.y);
    if (field_mask == 1 && (row & 1) == 1)
        discard;
    if (field_mask == 2 && (row & 1) == 0)
        discard;

    vec4 color = get_rgba_color();
    if (levels)
        color.rgb = LevelsControl(color.rgb, min_input, max_input, gamma, min_output, max_output);
    if (csb)
        color.rgb = ContrastSaturationBrightness(color.rgb, brt, sat, con);
    if (has_local_key)
        color *= texture(local_key, tex_coord1).r;
    if (has_layer_key)
        color *= texture(layer_key, tex_coord1).r;
    color *= opacity;
    color = blend(color);
    frag_color = color.bgra;
}
"#;

/// Assemble the fragment shader, with or without the blend-mode
/// catalog.
pub fn fragment(blend_modes: bool) -> String {
    let mut source = String::from("#version 330 core\n");
    source.push_str(UNIFORMS);
    source.push_str(ADJUSTMENT);
    if blend_modes {
        source.push_str(BLENDING);
        source.push_str(BLEND_COMPOSITE);
    } else {
        source.push_str(SIMPLE_COMPOSITE);
    }
    source.push_str(SAMPLING_AND_MAIN);
    source
}
